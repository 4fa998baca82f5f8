//! Class-file input handling.
//!
//! This module abstracts over where class bytes come from. A [`crate::file::File`] wraps either
//! an in-memory buffer or a memory-mapped file on disk behind the [`crate::file::Backend`] trait,
//! so locators can hand the codec a byte slice without caring about the source.
//!
//! # Key Components
//!
//! - [`crate::file::File`] - Owned class-file bytes from memory or disk
//! - [`crate::file::Backend`] - Trait for byte sources
//! - [`crate::file::parser::Parser`] - Bounds-checked cursor used by the codec
//! - [`crate::file::io`] - Big-endian primitive reading and writing

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use memory::Memory;
use physical::Physical;

use crate::Result;

/// Magic number every class file starts with.
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// A source of class-file bytes.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// Class-file bytes loaded from memory or from disk.
pub struct File {
    data: Box<dyn Backend>,
}

impl File {
    /// Memory-map a class file on disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped, and
    /// [`crate::Error::Malformed`] if it does not start with the class-file magic.
    pub fn from_file(path: impl AsRef<Path>) -> Result<File> {
        File::load(Box::new(Physical::new(path)?))
    }

    /// Wrap an owned byte buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the buffer does not start with the class-file magic.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        File::load(Box::new(Memory::new(data)))
    }

    fn load(data: Box<dyn Backend>) -> Result<File> {
        let magic: u32 = io::read_be(data.data_slice(0, 4)?)?;
        if magic != CLASS_MAGIC {
            return Err(malformed_error!("Invalid class file magic - {:#x}", magic));
        }
        Ok(File { data })
    }

    /// The raw class-file bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Length of the class file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the file holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Copy the bytes out of the backend.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data.data().to_vec()
    }
}

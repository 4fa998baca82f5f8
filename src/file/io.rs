//! Big-endian, bounds-checked reading and writing of primitive values.
//!
//! Class files store every multi-byte quantity in big-endian order. This module provides the
//! [`crate::file::io::ClassIO`] trait, which abstracts over the primitive types the codec reads,
//! together with free functions that read from or write into byte buffers while checking bounds.
//!
//! # Key Components
//!
//! - [`crate::file::io::ClassIO`] - Trait implemented for the integer and float primitives
//! - [`crate::file::io::read_be`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_be_at`] - Read a value at an offset and advance the offset
//! - [`crate::file::io::write_be_at`] - Overwrite a value at an offset and advance the offset
//! - [`crate::file::io::push_be`] - Append a value to a growable buffer
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classweave::file::io::{read_be_at, write_be_at};
//!
//! let mut data = [0u8; 6];
//! let mut offset = 0;
//! write_be_at(&mut data, &mut offset, 0xCAFE_u16)?;
//! write_be_at(&mut data, &mut offset, 0xBABE_0001_u32)?;
//!
//! offset = 0;
//! let magic: u16 = read_be_at(&data, &mut offset)?;
//! assert_eq!(magic, 0xCAFE);
//! # Ok::<(), classweave::Error>(())
//! ```
//!
//! # Error Handling
//!
//! Every reading and writing function returns [`crate::Error::OutOfBounds`] when the buffer is
//! too short for the requested value.

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive values that can be decoded from and encoded to big-endian bytes.
///
/// The associated `Bytes` type is the fixed-size array representation of the value.
pub trait ClassIO: Sized {
    /// Fixed-size byte representation of the value
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode a value from its big-endian representation
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Encode a value into its big-endian representation
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_class_io {
    ($($ty:ty => $n:expr),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $n];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_class_io!(
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
);

/// Read a big-endian value from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the value.
pub fn read_be<T: ClassIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Read a big-endian value at `offset`, advancing `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are not enough bytes left at `offset`.
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_be_bytes(read))
}

/// Overwrite a big-endian value at `offset`, advancing `offset` past it.
///
/// Used by the class writer to patch branch offsets and attribute lengths once they are known.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit at `offset`.
pub fn write_be_at<T: ClassIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_be_bytes();
    let bytes = bytes.as_ref();
    let end = offset.checked_add(bytes.len()).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;

    Ok(())
}

/// Append a big-endian value to `buffer`.
pub fn push_be<T: ClassIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_be_bytes().as_ref());
}

//! Cursor-based byte stream parser for class-file decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor over a byte slice used by
//! the class reader, the annotation decoder and the bytecode decoder. All reads are big-endian and
//! bounds checked.
//!
//! # Architecture
//!
//! The parser maintains a position within a borrowed byte slice:
//!
//! - **Position tracking** - Maintains the current offset for sequential parsing
//! - **Bounds checking** - All operations validate data availability before reading
//! - **Type-safe reading** - Generic reads for every [`crate::file::io::ClassIO`] type
//! - **Modified UTF-8** - Decoding of the JVM's string encoding
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classweave::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
//! parser.seek(6)?;
//! assert_eq!(parser.read_be::<u16>()?, 52);
//! # Ok::<(), classweave::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ClassIO},
    Result,
};

/// A cursor over a borrowed byte slice.
///
/// The parser never copies the underlying data. Sub-parsers for nested structures (attribute
/// bodies, bytecode) are created through [`Parser::sub_parser`], which bounds the view to the
/// nested structure's declared length.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` while unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to an absolute position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if this would move past the end of the data.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Current position of the cursor.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// The complete underlying data.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Look at the current byte without advancing.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(out_of_bounds_error!())
    }

    /// Read a big-endian value and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough bytes remain.
    pub fn read_be<T: ClassIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Read `len` raw bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(len)?;
        Ok(&self.data[start..self.position])
    }

    /// Read a `u4` length followed by that many bytes, returning a parser over them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the declared length exceeds the remaining data.
    pub fn sub_parser(&mut self) -> Result<Parser<'a>> {
        let len = self.read_be::<u32>()? as usize;
        Ok(Parser::new(self.read_bytes(len)?))
    }

    /// Run `f`, restoring the cursor position if it fails.
    ///
    /// # Errors
    /// Returns whatever `f` returns.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }

    /// Read a `u2` length-prefixed modified UTF-8 string.
    ///
    /// Modified UTF-8 encodes `U+0000` as two bytes and supplementary characters as surrogate
    /// pairs of three bytes each. Both are decoded into a regular Rust [`String`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for invalid byte sequences.
    pub fn read_modified_utf8(&mut self) -> Result<String> {
        let len = self.read_be::<u16>()? as usize;
        let bytes = self.read_bytes(len)?;
        decode_modified_utf8(bytes)
    }
}

/// Decode a modified UTF-8 byte sequence.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for invalid byte sequences.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    if bytes.iter().all(|b| *b != 0 && *b < 0x80) {
        return String::from_utf8(bytes.to_vec())
            .map_err(|_| malformed_error!("Invalid ASCII string"));
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let Some(b2) = bytes.get(i + 1) else {
                return Err(malformed_error!("Truncated modified UTF-8 sequence"));
            };
            units.push((u16::from(b & 0x1F) << 6) | u16::from(b2 & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let (Some(b2), Some(b3)) = (bytes.get(i + 1), bytes.get(i + 2)) else {
                return Err(malformed_error!("Truncated modified UTF-8 sequence"));
            };
            units.push(
                (u16::from(b & 0x0F) << 12) | (u16::from(b2 & 0x3F) << 6) | u16::from(b3 & 0x3F),
            );
            i += 3;
        } else {
            return Err(malformed_error!("Invalid modified UTF-8 lead byte - {}", b));
        }
    }

    String::from_utf16(&units).map_err(|_| malformed_error!("Invalid surrogate pair in string"))
}

/// Encode a string as modified UTF-8.
#[must_use]
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_seek_and_advance() {
        let data = [0x00, 0x01, 0x02, 0x03];
        let mut parser = Parser::new(&data);

        parser.advance_by(2).unwrap();
        assert_eq!(parser.peek_byte().unwrap(), 0x02);
        assert!(parser.seek(4).is_err());
        assert!(parser.advance_by(3).is_err());
        assert_eq!(parser.pos(), 2);
    }

    #[test]
    fn test_sub_parser_bounds() {
        let data = [0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB, 0xCC];
        let mut parser = Parser::new(&data);

        let mut sub = parser.sub_parser().unwrap();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.read_be::<u16>().unwrap(), 0xAABB);
        assert!(!sub.has_more_data());
        assert_eq!(parser.read_be::<u8>().unwrap(), 0xCC);
    }

    #[test]
    fn test_transactional_restores() {
        let data = [0x01];
        let mut parser = Parser::new(&data);
        let result = parser.transactional(|p| p.read_be::<u32>());
        assert!(matches!(result, Err(Error::OutOfBounds)));
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn test_modified_utf8_nul_and_supplementary() {
        let text = "a\u{0}b\u{1F600}";
        let encoded = encode_modified_utf8(text);
        assert_eq!(&encoded[..4], &[b'a', 0xC0, 0x80, b'b']);
        assert_eq!(encoded.len(), 4 + 6);
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), text);
    }

    #[test]
    fn test_read_modified_utf8_prefixed() {
        let data = [0x00, 0x03, b'f', b'o', b'o'];
        let mut parser = Parser::new(&data);
        assert_eq!(parser.read_modified_utf8().unwrap(), "foo");
    }
}

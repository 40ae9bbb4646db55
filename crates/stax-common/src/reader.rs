//! Binary reader for parsing byte slices.
//!
//! This module provides [`BinaryReader`], a cursor over a byte slice that
//! decodes little-endian integers without copying the underlying data.

use byteorder::{ByteOrder, LittleEndian};
use zerocopy::FromBytes;

use crate::codec::Width;
use crate::{Error, Result};

/// A cursor that reads little-endian values from a byte slice.
///
/// # Example
///
/// ```
/// use stax_common::{BinaryReader, Width};
///
/// let data = [0x05, b'a', b'.', b't', b'x', b't', 0x10, 0x00];
/// let mut reader = BinaryReader::new(&data);
///
/// let len = reader.read_u8().unwrap() as usize;
/// assert_eq!(reader.read_bytes(len).unwrap(), b"a.txt");
/// assert_eq!(reader.read_uint(Width::Word).unwrap(), 16);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                needed: count,
                available: self.remaining(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Read a little-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_bytes(2).map(LittleEndian::read_u16)
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_bytes(4).map(LittleEndian::read_u32)
    }

    /// Read a little-endian u64.
    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_bytes(8).map(LittleEndian::read_u64)
    }

    /// Read a little-endian unsigned integer of the given width.
    #[inline]
    pub fn read_uint(&mut self, width: Width) -> Result<u64> {
        self.read_bytes(width.bytes())
            .map(|b| LittleEndian::read_uint(b, width.bytes()))
    }

    /// Read a fixed-layout record using zerocopy.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            needed: size,
            available: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [
            0x07u8, // u8
            0x34, 0x12, // u16: 0x1234
            0x01, 0x02, 0x03, 0x04, // u32: 0x04030201
            0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // u64::MAX
        ];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_uint_widths() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_uint(Width::Word).unwrap(), 1);
        assert_eq!(reader.read_uint(Width::DWord).unwrap(), 2);
        assert_eq!(reader.position(), 6);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.peek_bytes(2).unwrap(), &[0x01, 0x02]);
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn test_eof_error() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data);

        let err = reader.read_u32().unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedEof {
                needed: 4,
                available: 2
            }
        ));
        // A failed read leaves the cursor where it was.
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_read_struct() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut reader = BinaryReader::new(&data);

        let pair: [u8; 2] = reader.read_struct().unwrap();
        assert_eq!(pair, [0xAA, 0xBB]);
        assert!(reader.read_struct::<[u8; 2]>().is_err());
    }
}

//! Fixed-width little-endian integer codec.
//!
//! Every multi-byte integer in a stax archive is little-endian and unsigned.
//! The data-size field of an entry changes width with the archive's size
//! mode, so the width is a runtime value here rather than a type parameter.

use byteorder::{ByteOrder, LittleEndian};

use crate::{Error, Result};

/// Width of an encoded unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Width {
    /// 1 byte.
    Byte = 1,
    /// 2 bytes.
    Word = 2,
    /// 4 bytes.
    DWord = 4,
    /// 8 bytes.
    QWord = 8,
}

impl Width {
    /// Number of bytes occupied by a value of this width.
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Largest value representable at this width.
    #[inline]
    pub const fn max_value(self) -> u64 {
        match self {
            Width::Byte => u8::MAX as u64,
            Width::Word => u16::MAX as u64,
            Width::DWord => u32::MAX as u64,
            Width::QWord => u64::MAX,
        }
    }

    /// Width for a byte count, if it is one of 1, 2, 4 or 8.
    #[inline]
    pub const fn from_bytes(count: usize) -> Option<Self> {
        match count {
            1 => Some(Width::Byte),
            2 => Some(Width::Word),
            4 => Some(Width::DWord),
            8 => Some(Width::QWord),
            _ => None,
        }
    }

    /// Check whether `value` fits in this width.
    #[inline]
    pub const fn fits(self, value: u64) -> bool {
        value <= self.max_value()
    }
}

/// Encode `value` as `width` little-endian bytes.
///
/// Values that do not fit are rejected rather than truncated.
///
/// # Example
///
/// ```
/// use stax_common::codec::{self, Width};
///
/// assert_eq!(codec::encode(0x0102, Width::Word).unwrap(), vec![0x02, 0x01]);
/// assert!(codec::encode(0x1_0000, Width::Word).is_err());
/// ```
pub fn encode(value: u64, width: Width) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(width.bytes());
    encode_into(value, width, &mut out)?;
    Ok(out)
}

/// Append `value` as `width` little-endian bytes to `out`.
pub fn encode_into(value: u64, width: Width, out: &mut Vec<u8>) -> Result<()> {
    if !width.fits(value) {
        return Err(Error::ValueOutOfRange { value, width });
    }

    let start = out.len();
    out.resize(start + width.bytes(), 0);
    LittleEndian::write_uint(&mut out[start..], value, width.bytes());
    Ok(())
}

/// Decode a little-endian unsigned integer; the width is the slice length.
pub fn decode(bytes: &[u8]) -> Result<u64> {
    let width = Width::from_bytes(bytes.len()).ok_or(Error::InvalidWidth(bytes.len()))?;
    Ok(LittleEndian::read_uint(bytes, width.bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_little_endian() {
        assert_eq!(encode(0xAB, Width::Byte).unwrap(), vec![0xAB]);
        assert_eq!(encode(0x0102, Width::Word).unwrap(), vec![0x02, 0x01]);
        assert_eq!(
            encode(0x0102_0304, Width::DWord).unwrap(),
            vec![0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(
            encode(0x0102_0304_0506_0708, Width::QWord).unwrap(),
            vec![0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_encode_rejects_overflow() {
        assert!(encode(u16::MAX as u64, Width::Word).is_ok());

        let err = encode(u16::MAX as u64 + 1, Width::Word).unwrap_err();
        assert!(matches!(
            err,
            Error::ValueOutOfRange {
                value: 0x1_0000,
                width: Width::Word
            }
        ));
        assert!(encode(u64::MAX, Width::QWord).is_ok());
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode(&[0xFF, 0xFF]).unwrap(), 0xFFFF);
        assert_eq!(decode(&[0x01, 0x00, 0x00, 0x00]).unwrap(), 1);
        assert_eq!(decode(&[0xFF; 8]).unwrap(), u64::MAX);
    }

    #[test]
    fn test_decode_invalid_width() {
        assert!(matches!(decode(&[0; 3]), Err(Error::InvalidWidth(3))));
        assert!(matches!(decode(&[]), Err(Error::InvalidWidth(0))));
    }

    #[test]
    fn test_encode_into_appends() {
        let mut out = vec![0xEE];
        encode_into(7, Width::DWord, &mut out).unwrap();
        assert_eq!(out, vec![0xEE, 7, 0, 0, 0]);
    }

    #[test]
    fn test_width_bounds() {
        assert_eq!(Width::Byte.max_value(), 255);
        assert_eq!(Width::Word.max_value(), 65_535);
        assert_eq!(Width::DWord.max_value(), 4_294_967_295);
        assert_eq!(Width::QWord.max_value(), 18_446_744_073_709_551_615);
        assert_eq!(Width::from_bytes(4), Some(Width::DWord));
        assert_eq!(Width::from_bytes(5), None);
    }
}

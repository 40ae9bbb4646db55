//! Size modes bounding the maximum file size.

use std::fmt;
use std::str::FromStr;

use stax_common::Width;

use crate::{Error, Result};

/// Width of every entry's data-size field.
///
/// Chosen when the archive is created and stored in the signature; it cannot
/// change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SizeMode {
    /// 16-bit sizes, up to 65 535 bytes per file.
    M16 = 0,
    /// 32-bit sizes, up to 4 294 967 295 bytes per file.
    M32 = 1,
    /// 64-bit sizes.
    #[default]
    M64 = 2,
}

impl SizeMode {
    /// All size modes, smallest first.
    pub const ALL: [SizeMode; 3] = [SizeMode::M16, SizeMode::M32, SizeMode::M64];

    /// Width of the data-size field.
    #[inline]
    pub const fn width(self) -> Width {
        match self {
            SizeMode::M16 => Width::Word,
            SizeMode::M32 => Width::DWord,
            SizeMode::M64 => Width::QWord,
        }
    }

    /// Largest payload a single entry may hold.
    #[inline]
    pub const fn max_file_size(self) -> u64 {
        self.width().max_value()
    }

    /// Check whether a payload of `size` bytes fits.
    #[inline]
    pub const fn fits(self, size: u64) -> bool {
        self.width().fits(size)
    }

    /// Tag stored in the signature.
    #[inline]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for SizeMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SizeMode::M16),
            1 => Ok(SizeMode::M32),
            2 => Ok(SizeMode::M64),
            other => Err(Error::InvalidSizeMode(other)),
        }
    }
}

impl fmt::Display for SizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SizeMode::M16 => "M16",
            SizeMode::M32 => "M32",
            SizeMode::M64 => "M64",
        };
        f.write_str(name)
    }
}

impl FromStr for SizeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "16" | "m16" => Ok(SizeMode::M16),
            "32" | "m32" => Ok(SizeMode::M32),
            "64" | "m64" => Ok(SizeMode::M64),
            _ => Err(format!("unknown size mode {s:?}, expected 16, 32 or 64")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_file_size() {
        assert_eq!(SizeMode::M16.max_file_size(), 65_535);
        assert_eq!(SizeMode::M32.max_file_size(), 4_294_967_295);
        assert_eq!(SizeMode::M64.max_file_size(), 18_446_744_073_709_551_615);
    }

    #[test]
    fn test_fits_boundary() {
        for mode in SizeMode::ALL {
            assert!(mode.fits(mode.max_file_size()));
        }
        assert!(!SizeMode::M16.fits(65_536));
        assert!(!SizeMode::M32.fits(u32::MAX as u64 + 1));
        assert!(SizeMode::M64.fits(u64::MAX));
    }

    #[test]
    fn test_tag_roundtrip() {
        for mode in SizeMode::ALL {
            assert_eq!(SizeMode::try_from(mode.tag()).unwrap(), mode);
        }
        assert!(matches!(SizeMode::try_from(3), Err(Error::InvalidSizeMode(3))));
    }

    #[test]
    fn test_parse() {
        assert_eq!("16".parse::<SizeMode>().unwrap(), SizeMode::M16);
        assert_eq!("M32".parse::<SizeMode>().unwrap(), SizeMode::M32);
        assert_eq!("m64".parse::<SizeMode>().unwrap(), SizeMode::M64);
        assert!("8".parse::<SizeMode>().is_err());
        assert_eq!(SizeMode::default(), SizeMode::M64);
    }
}

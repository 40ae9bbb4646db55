//! Archive signature block.
//!
//! The signature occupies the first 22 bytes of every archive:
//!
//! ```text
//! magic[8] | general_purpose(u32) | file_count(u64) | size_mode(u8) | crc_enabled(u8)
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use stax_common::BinaryReader;
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::size_mode::SizeMode;
use crate::{Error, Result};

/// On-disk layout of the signature.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct SignatureRecord {
    magic: [u8; 8],
    general_purpose: U32,
    file_count: U64,
    size_mode: u8,
    crc_enabled: u8,
}

/// Decoded archive signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Signature {
    /// Caller-defined value, not interpreted by the archive.
    pub general_purpose: u32,
    /// Number of entries recorded when the signature was last written.
    pub file_count: u64,
    /// Width of every entry's data-size field.
    pub size_mode: SizeMode,
    /// Whether every entry header carries a CRC32.
    pub crc_enabled: bool,
}

impl Signature {
    /// Magic bytes at the start of every archive.
    pub const MAGIC: [u8; 8] = [0x91, 0xde, 0xee, 0x9c, 0x80, 0x5c, 0x23, 0xe6];

    /// Encoded size of the signature in bytes.
    pub const SIZE: usize = std::mem::size_of::<SignatureRecord>();

    /// Signature of an empty archive.
    pub const fn new(size_mode: SizeMode, crc_enabled: bool) -> Self {
        Self {
            general_purpose: 0,
            file_count: 0,
            size_mode,
            crc_enabled,
        }
    }

    /// Encode the signature.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let record = SignatureRecord {
            magic: Self::MAGIC,
            general_purpose: U32::new(self.general_purpose),
            file_count: U64::new(self.file_count),
            size_mode: self.size_mode.tag(),
            crc_enabled: u8::from(self.crc_enabled),
        };

        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(record.as_bytes());
        out
    }

    /// Decode a signature, rejecting a wrong magic.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_inner(bytes, true)
    }

    /// Decode a signature without looking at the magic.
    pub fn parse_unchecked(bytes: &[u8]) -> Result<Self> {
        Self::parse_inner(bytes, false)
    }

    fn parse_inner(bytes: &[u8], check_magic: bool) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let record: SignatureRecord = reader.read_struct()?;

        if check_magic && record.magic != Self::MAGIC {
            return Err(Error::InvalidMagic {
                actual: record.magic,
            });
        }

        Ok(Self {
            general_purpose: record.general_purpose.get(),
            file_count: record.file_count.get(),
            size_mode: SizeMode::try_from(record.size_mode)?,
            crc_enabled: record.crc_enabled != 0,
        })
    }

    /// Write the signature at offset 0, replacing whatever was there.
    pub fn write<W: Write + Seek>(&self, store: &mut W) -> Result<()> {
        store.seek(SeekFrom::Start(0))?;
        store.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Read and validate the signature at offset 0.
    pub fn read<R: Read + Seek>(store: &mut R) -> Result<Self> {
        Self::parse(&Self::read_raw(store)?)
    }

    /// Read the signature at offset 0 without validating the magic.
    pub fn read_unchecked<R: Read + Seek>(store: &mut R) -> Result<Self> {
        Self::parse_unchecked(&Self::read_raw(store)?)
    }

    /// Read the signature of the archive at `path`.
    ///
    /// This trusts the stored file count; it does not scan the entries.
    pub fn read_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        Self::read(&mut file)
    }

    fn read_raw<R: Read + Seek>(store: &mut R) -> Result<[u8; Self::SIZE]> {
        store.seek(SeekFrom::Start(0))?;

        let mut bytes = [0u8; Self::SIZE];
        store.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::corrupt(0, "store is shorter than the signature"),
            _ => Error::Io(e),
        })?;
        Ok(bytes)
    }
}

/// Check whether the file at `path` starts with a valid archive signature.
///
/// Never fails: unreadable or missing files are simply not archives.
pub fn is_archive<P: AsRef<Path>>(path: P) -> bool {
    match File::open(path) {
        Ok(mut file) => Signature::read(&mut file).is_ok(),
        Err(_) => false,
    }
}

/// Check whether `stream` starts with a valid archive signature.
///
/// The stream position is restored afterwards.
pub fn is_archive_stream<R: Read + Seek>(stream: &mut R) -> bool {
    let Ok(position) = stream.stream_position() else {
        return false;
    };

    let valid = Signature::read(stream).is_ok();
    let _ = stream.seek(SeekFrom::Start(position));
    valid
}

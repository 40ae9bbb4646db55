//! Entry headers and file metadata.
//!
//! Every entry is a header followed directly by its payload:
//!
//! ```text
//! name_len(u8) | name[name_len] | [crc32(u32)] | data_size(u16|u32|u64) | data[data_size]
//! ```
//!
//! The CRC field is present only when the signature enables it, and the
//! width of `data_size` follows the signature's [`SizeMode`].

use std::io::Read;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use stax_common::{codec, BinaryReader};

use crate::size_mode::SizeMode;
use crate::{Error, Result};

/// Longest entry name the one-byte length prefix can describe.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Encoded length of an entry header.
#[inline]
pub fn header_len(name_len: usize, size_mode: SizeMode, crc_enabled: bool) -> u64 {
    let crc_len = if crc_enabled { 4 } else { 0 };
    (1 + name_len + crc_len + size_mode.width().bytes()) as u64
}

/// Decoded per-entry header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Entry name, usually a relative path with `/` separators.
    pub name: String,
    /// CRC32 of the payload, 0 when the archive does not store checksums.
    pub crc32: u32,
    /// Payload length in bytes.
    pub data_size: u64,
}

impl EntryHeader {
    /// Create a header, rejecting names longer than [`MAX_NAME_LEN`] bytes.
    pub fn new(name: impl Into<String>, crc32: u32, data_size: u64) -> Result<Self> {
        let name = name.into();
        check_name(&name)?;
        Ok(Self {
            name,
            crc32,
            data_size,
        })
    }

    /// Encoded length of this header.
    #[inline]
    pub fn encoded_len(&self, size_mode: SizeMode, crc_enabled: bool) -> u64 {
        header_len(self.name.len(), size_mode, crc_enabled)
    }

    /// Encode the header.
    ///
    /// The CRC is written only if `crc_enabled`; the data size uses the
    /// width of `size_mode` and is rejected if it does not fit.
    pub fn encode(&self, size_mode: SizeMode, crc_enabled: bool) -> Result<Vec<u8>> {
        check_name(&self.name)?;

        let mut out = Vec::with_capacity(self.encoded_len(size_mode, crc_enabled) as usize);
        out.write_u8(self.name.len() as u8)?;
        out.extend_from_slice(self.name.as_bytes());
        if crc_enabled {
            out.write_u32::<LittleEndian>(self.crc32)?;
        }
        codec::encode_into(self.data_size, size_mode.width(), &mut out)?;

        Ok(out)
    }

    /// Decode a header from the start of `bytes`.
    pub fn parse(bytes: &[u8], size_mode: SizeMode, crc_enabled: bool) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);

        let name_len = reader.read_u8()? as usize;
        let name = String::from_utf8_lossy(reader.read_bytes(name_len)?).into_owned();
        let crc32 = if crc_enabled { reader.read_u32()? } else { 0 };
        let data_size = reader.read_uint(size_mode.width())?;

        Ok(Self {
            name,
            crc32,
            data_size,
        })
    }

    /// Read a header from a stream positioned at its first byte.
    ///
    /// Leaves the stream positioned at the start of the payload.
    pub fn read_from<R: Read>(reader: &mut R, size_mode: SizeMode, crc_enabled: bool) -> Result<Self> {
        let name_len = reader.read_u8()?;

        let mut bytes = vec![0u8; header_len(name_len as usize, size_mode, crc_enabled) as usize];
        bytes[0] = name_len;
        reader.read_exact(&mut bytes[1..])?;

        Self::parse(&bytes, size_mode, crc_enabled)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong {
            name: name.to_string(),
            length: name.len(),
        });
    }
    Ok(())
}

/// Location and metadata of one entry inside an open archive.
///
/// Offsets are only meaningful for the archive session that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileInfo {
    /// Entry name.
    name: String,
    /// Payload size in bytes.
    size: u64,
    /// Stored CRC32, 0 when checksums are disabled.
    crc32: u32,
    /// Offset of the entry header.
    offset: u64,
    /// Offset of the first payload byte.
    data_offset: u64,
}

impl FileInfo {
    pub(crate) fn new(header: EntryHeader, offset: u64, data_offset: u64) -> Self {
        Self {
            name: header.name,
            size: header.data_size,
            crc32: header.crc32,
            offset,
            data_offset,
        }
    }

    /// Get the entry name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the payload size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the stored CRC32.
    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Get the offset of the entry header.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Get the offset of the payload.
    #[inline]
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Offset one past the last payload byte.
    #[inline]
    pub fn data_end(&self) -> u64 {
        self.data_offset + self.size
    }

    /// Get the relative output path for extraction.
    ///
    /// Backslashes are treated as separators so archives built on Windows
    /// extract into directories everywhere.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.name.replace('\\', "/"))
    }

    /// Get the file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
    }
}

//! Error types for the archive crate.

use thiserror::Error;

use crate::archive::ArchiveState;
use crate::signature::Signature;
use crate::size_mode::SizeMode;

/// Errors that can occur when working with stax archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] stax_common::Error),

    /// The store does not start with the archive magic.
    #[error("invalid archive signature: expected {:02x?}, got {actual:02x?}", Signature::MAGIC)]
    InvalidMagic { actual: [u8; 8] },

    /// Unknown size-mode tag in the signature.
    #[error("invalid size mode tag: {0}")]
    InvalidSizeMode(u8),

    /// The signature or an entry does not fit inside the store.
    #[error("corrupt archive at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// Entry name does not fit the one-byte length prefix.
    #[error("entry name is {length} bytes long, the limit is 255: {name:?}")]
    NameTooLong { name: String, length: usize },

    /// Payload exceeds the archive's size mode.
    #[error("{name:?} is {size} bytes, {size_mode} archives hold at most {max} bytes per file")]
    FileTooLarge {
        name: String,
        size: u64,
        max: u64,
        size_mode: SizeMode,
    },

    /// Payload CRC32 does not match the one stored in the header.
    #[error("CRC32 mismatch for {name:?}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Operation not permitted in the archive's current state.
    #[error("cannot {operation}: archive is {state}")]
    InvalidState {
        operation: &'static str,
        state: ArchiveState,
    },

    /// Entry not found.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Entry name would escape the extraction directory.
    #[error("refusing to extract unsafe path: {0:?}")]
    UnsafePath(String),
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad magic, unknown size mode, or corrupt entry stream.
    Format,
    /// Entry name longer than 255 bytes.
    NameTooLong,
    /// Payload larger than the size mode allows.
    FileTooLarge,
    /// CRC32 mismatch.
    Integrity,
    /// Wrong mode, or the archive is closed.
    InvalidState,
    /// Named entry does not exist.
    NotFound,
    /// Entry name is not safe to extract.
    UnsafePath,
    /// Underlying I/O failure.
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Common(_)
            | Error::InvalidMagic { .. }
            | Error::InvalidSizeMode(_)
            | Error::Corrupt { .. } => ErrorKind::Format,
            Error::NameTooLong { .. } => ErrorKind::NameTooLong,
            Error::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            Error::CrcMismatch { .. } => ErrorKind::Integrity,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::EntryNotFound(_) => ErrorKind::NotFound,
            Error::UnsafePath(_) => ErrorKind::UnsafePath,
        }
    }

    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

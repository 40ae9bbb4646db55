//! Error types for stax-common.

use thiserror::Error;

use crate::codec::Width;

/// Common error type for stax operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// Value does not fit the requested integer width.
    #[error("value {value} does not fit in {} bytes", width.bytes())]
    ValueOutOfRange { value: u64, width: Width },

    /// Buffer length is not one of the supported integer widths.
    #[error("invalid integer width: {0} bytes")]
    InvalidWidth(usize),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

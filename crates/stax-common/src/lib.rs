//! Common utilities for stax.
//!
//! This crate provides the foundational pieces shared by the stax crates:
//!
//! - [`codec`] - Little-endian integer encoding at fixed widths
//! - [`BinaryReader`] - Cursor-style reading from byte slices
//! - [`crc`] - CRC32 (IEEE) hashing utilities

mod error;
mod reader;

pub mod codec;
pub mod crc;

pub use codec::Width;
pub use error::{Error, Result};
pub use reader::BinaryReader;

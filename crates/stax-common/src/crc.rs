//! CRC32 hashing utilities.
//!
//! Entries use the IEEE polynomial (the one zlib and ZIP use), so checksums
//! written by other tools for the same bytes agree with ours.

pub use crc32fast::Hasher;

/// Compute the CRC32 of a byte slice.
#[inline]
pub fn hash_bytes(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

//! Stax - stacked-file archive library.
//!
//! This crate provides a unified interface to the stax crates.
//!
//! # Crates
//!
//! - [`stax_common`] - Common utilities (binary codec, byte reading, CRC32)
//! - [`stax_archive`] - Archive format and engine
//!
//! # Example
//!
//! ```no_run
//! use stax::prelude::*;
//!
//! let mut archive = Archive::open_read("assets.stx", ArchiveOptions::default())?;
//! println!("{} entries, {}", archive.file_count(), archive.size_mode());
//!
//! let info = archive.file_info("readme.txt")?.clone();
//! let data = archive.read(&info)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use stax_archive as archive;
pub use stax_common as common;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use stax_archive::{
        is_archive, Archive, ArchiveOptions, ArchiveState, BatchReport, Error, ErrorKind, FileInfo,
        OpenMode, Signature, SizeMode,
    };
    pub use stax_common::crc;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Stacked-file archive container.
//!
//! An archive is a 22-byte signature followed by entries packed back to
//! back, each a small header and the raw payload:
//!
//! - Three size modes (16, 32 or 64-bit data-size fields) trading header
//!   overhead against the largest file an entry may hold
//! - Optional CRC32 per entry, verified on read
//! - Append-only writes; the signature's file count is kept up to date
//! - Directory rebuilt by scanning every entry when an archive is opened
//!
//! # Example
//!
//! ```no_run
//! use stax_archive::{Archive, ArchiveOptions, SizeMode};
//!
//! let mut archive = Archive::create("assets.stx", SizeMode::M32, ArchiveOptions::default())?;
//! archive.append("readme.txt", b"hello")?;
//! archive.add("textures/")?;
//! archive.close()?;
//!
//! let mut archive = Archive::open_read("assets.stx", ArchiveOptions::default())?;
//! for info in archive.file_infos()? {
//!     println!("{}: {} bytes", info.name(), info.size());
//! }
//! let data = archive.read_by_name("readme.txt")?;
//! # Ok::<(), stax_archive::Error>(())
//! ```

mod archive;
mod batch;
mod entry;
mod error;
mod options;
mod signature;
mod size_mode;

pub use archive::{Archive, ArchiveState, OpenMode};
pub use batch::{walk_sources, BatchReport, SourceFile};
pub use entry::{header_len, EntryHeader, FileInfo, MAX_NAME_LEN};
pub use error::{Error, ErrorKind, Result};
pub use options::ArchiveOptions;
pub use signature::{is_archive, is_archive_stream, Signature};
pub use size_mode::SizeMode;

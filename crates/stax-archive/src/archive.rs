//! Archive engine.
//!
//! [`Archive`] owns the backing store, keeps the signature in sync with the
//! entries it appends, and holds the directory of every entry found when the
//! archive was opened.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use rustc_hash::FxHashMap;
use stax_common::crc::Hasher;
use tracing::{debug, error, trace, warn};

use crate::entry::{header_len, EntryHeader, FileInfo};
use crate::options::ArchiveOptions;
use crate::signature::Signature;
use crate::size_mode::SizeMode;
use crate::{Error, Result};

/// Chunk size for streaming payloads in and out of the store.
const BUFFER_SIZE: usize = 256 * 1024;

/// How an archive is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Read an existing archive.
    Read,
    /// Read an existing archive and append new entries to it.
    Append,
    /// Start a new, empty archive.
    Create,
}

/// Lifecycle state of an [`Archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveState {
    Closed,
    OpenForRead,
    OpenForWrite,
    OpenForAppend,
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            ArchiveState::Closed => "closed",
            ArchiveState::OpenForRead => "open for read",
            ArchiveState::OpenForWrite => "open for write",
            ArchiveState::OpenForAppend => "open for append",
        };
        f.write_str(state)
    }
}

/// A stacked-file archive over a seekable store.
///
/// Opening an existing archive scans every entry to build the directory, so
/// lookups never touch the store. Entries are appended after the last scanned
/// entry and the signature is rewritten after each one.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use stax_archive::{Archive, ArchiveOptions, OpenMode, SizeMode};
///
/// let mut archive = Archive::from_store(
///     Cursor::new(Vec::new()),
///     OpenMode::Create,
///     SizeMode::M32,
///     ArchiveOptions::default(),
/// )?;
/// let info = archive.append("hello.txt", b"hello")?;
/// assert_eq!(archive.read(&info)?, b"hello");
/// # Ok::<(), stax_archive::Error>(())
/// ```
pub struct Archive<S: Read + Write + Seek = File> {
    /// Backing store, `None` once closed.
    store: Option<S>,
    mode: OpenMode,
    options: ArchiveOptions,
    signature: Signature,
    /// Entries in store order.
    directory: Vec<FileInfo>,
    /// Name to the position of its first occurrence in `directory`.
    index: FxHashMap<String, usize>,
    /// Offset one past the last entry.
    end_offset: u64,
    /// Signature changed in memory but not yet written.
    dirty: bool,
    /// An append failed after writing started; no further appends.
    poisoned: bool,
}

impl Archive<File> {
    /// Open the archive at `path`.
    ///
    /// `size_mode` only applies to [`OpenMode::Create`]; existing archives
    /// keep the size mode recorded in their signature.
    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: OpenMode,
        size_mode: SizeMode,
        options: ArchiveOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = match mode {
            OpenMode::Read => File::open(path)?,
            OpenMode::Append => OpenOptions::new().read(true).write(true).open(path)?,
            OpenMode::Create => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
        };

        debug!(path = %path.display(), ?mode, "opening archive");
        Self::from_store(file, mode, size_mode, options)
    }

    /// Create a new archive at `path`, replacing any existing file.
    pub fn create<P: AsRef<Path>>(path: P, size_mode: SizeMode, options: ArchiveOptions) -> Result<Self> {
        Self::open(path, OpenMode::Create, size_mode, options)
    }

    /// Open an existing archive for reading.
    pub fn open_read<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        Self::open(path, OpenMode::Read, SizeMode::default(), options)
    }

    /// Open an existing archive for appending.
    pub fn open_append<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        Self::open(path, OpenMode::Append, SizeMode::default(), options)
    }

    /// Flush, then wait until the file's data and metadata reach the disk.
    pub fn sync_all(&mut self) -> Result<()> {
        self.flush()?;
        let file = open_store(&mut self.store, "sync")?;
        file.sync_all()?;
        Ok(())
    }
}

impl<S: Read + Write + Seek> Archive<S> {
    /// Open an archive over an already opened store.
    ///
    /// With [`OpenMode::Create`] the signature is written at offset 0 and the
    /// archive starts empty; the store is expected to be empty as well.
    pub fn from_store(
        mut store: S,
        mode: OpenMode,
        size_mode: SizeMode,
        options: ArchiveOptions,
    ) -> Result<Self> {
        let signature = match mode {
            OpenMode::Create => {
                let signature = Signature::new(size_mode, options.write_crc);
                signature.write(&mut store)?;
                signature
            }
            OpenMode::Read | OpenMode::Append if options.disable_checks => {
                Signature::read_unchecked(&mut store)?
            }
            OpenMode::Read | OpenMode::Append => Signature::read(&mut store)?,
        };

        let mut archive = Self {
            store: Some(store),
            mode,
            options,
            signature,
            directory: Vec::new(),
            index: FxHashMap::default(),
            end_offset: Signature::SIZE as u64,
            dirty: false,
            poisoned: false,
        };

        if mode != OpenMode::Create {
            archive.rebuild_directory()?;
        }

        debug!(
            ?mode,
            size_mode = %archive.signature.size_mode,
            crc = archive.signature.crc_enabled,
            entries = archive.directory.len(),
            "archive opened"
        );
        Ok(archive)
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> ArchiveState {
        match (&self.store, self.mode) {
            (None, _) => ArchiveState::Closed,
            (Some(_), OpenMode::Read) => ArchiveState::OpenForRead,
            (Some(_), OpenMode::Create) => ArchiveState::OpenForWrite,
            (Some(_), OpenMode::Append) => ArchiveState::OpenForAppend,
        }
    }

    /// Get the mode the archive was opened with.
    #[inline]
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Check whether entries can be appended.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.store.is_some() && self.mode != OpenMode::Read
    }

    /// Get the options the archive was opened with.
    #[inline]
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Get mutable access to the options.
    #[inline]
    pub fn options_mut(&mut self) -> &mut ArchiveOptions {
        &mut self.options
    }

    /// Get the in-memory signature.
    ///
    /// In read mode `file_count` is the value found on disk, which may
    /// disagree with [`Archive::file_count`].
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Get the size mode.
    #[inline]
    pub fn size_mode(&self) -> SizeMode {
        self.signature.size_mode
    }

    /// Check whether entries carry a CRC32.
    #[inline]
    pub fn crc_enabled(&self) -> bool {
        self.signature.crc_enabled
    }

    /// Get the largest payload a single entry may hold.
    #[inline]
    pub fn max_file_size(&self) -> u64 {
        self.signature.size_mode.max_file_size()
    }

    /// Get the general-purpose field of the signature.
    #[inline]
    pub fn general_purpose(&self) -> u32 {
        self.signature.general_purpose
    }

    /// Set the general-purpose field; it is written on the next flush.
    pub fn set_general_purpose(&mut self, value: u32) -> Result<()> {
        self.ensure_writable("set the general purpose field")?;
        self.signature.general_purpose = value;
        self.dirty = true;
        Ok(())
    }

    /// Get the number of entries in the directory.
    #[inline]
    pub fn file_count(&self) -> u64 {
        self.directory.len() as u64
    }

    /// Append an in-memory payload.
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<FileInfo> {
        self.append_from(name, &mut &data[..], data.len() as u64)
    }

    /// Append a file from disk under `name`.
    pub fn append_file<P: AsRef<Path>>(&mut self, name: &str, path: P) -> Result<FileInfo> {
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        self.append_from(name, &mut file, size)
    }

    /// Append `size` bytes read from `reader`.
    ///
    /// Size and name limits are checked before anything is written. The
    /// reader must yield exactly `size` bytes.
    pub fn append_from<R: Read>(&mut self, name: &str, reader: &mut R, size: u64) -> Result<FileInfo> {
        self.ensure_writable("append")?;

        let size_mode = self.signature.size_mode;
        let crc_enabled = self.signature.crc_enabled;

        if !size_mode.fits(size) {
            return Err(Error::FileTooLarge {
                name: name.to_string(),
                size,
                max: size_mode.max_file_size(),
                size_mode,
            });
        }

        let mut header = EntryHeader::new(name, 0, size)?;
        let encoded = header.encode(size_mode, crc_enabled)?;
        let offset = self.end_offset;
        let data_offset = offset + encoded.len() as u64;

        if self.poisoned {
            return Err(Error::corrupt(
                offset,
                "an earlier append failed part-way, the archive must be reopened",
            ));
        }

        let store = open_store(&mut self.store, "append")?;
        match write_entry(store, offset, &encoded, reader, size, crc_enabled, name.len()) {
            Ok(crc32) => header.crc32 = crc32,
            Err(err) => {
                // Partial bytes now sit past the last entry and a shorter
                // append would not cover them.
                self.poisoned = true;
                warn!(name, offset, error = %err, "append failed after writing started");
                return Err(err);
            }
        }

        let info = FileInfo::new(header, offset, data_offset);
        self.index
            .entry(info.name().to_string())
            .or_insert(self.directory.len());
        self.directory.push(info.clone());
        self.end_offset = data_offset + size;

        // The entry is complete; a failed signature write is retried on flush.
        self.signature.file_count += 1;
        self.dirty = true;
        self.signature.write(store)?;
        self.dirty = false;

        trace!(name, size, offset, crc = info.crc32(), "appended entry");
        Ok(info)
    }

    /// Read an entry's payload into memory.
    pub fn read(&mut self, info: &FileInfo) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(info.size().min(self.end_offset) as usize);
        self.read_into(info, &mut out)?;
        Ok(out)
    }

    /// Read the payload of the first entry called `name`.
    pub fn read_by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let info = self.file_info(name)?.clone();
        self.read(&info)
    }

    /// Stream an entry's payload into `writer`, returning the byte count.
    ///
    /// When the archive stores checksums and checks are enabled, the CRC32
    /// is verified after the last byte; `writer` has then already received
    /// the data.
    pub fn read_into<W: Write + ?Sized>(&mut self, info: &FileInfo, writer: &mut W) -> Result<u64> {
        let verify = self.signature.crc_enabled && !self.options.disable_checks;
        let end_offset = self.end_offset;
        let store = open_store(&mut self.store, "read")?;

        let in_bounds = info.data_offset() >= Signature::SIZE as u64
            && info
                .data_offset()
                .checked_add(info.size())
                .is_some_and(|end| end <= end_offset);
        if !in_bounds {
            return Err(Error::corrupt(
                info.offset(),
                format!("{:?} lies outside the archive's entries", info.name()),
            ));
        }

        store.seek(SeekFrom::Start(info.data_offset()))?;
        let mut hasher = verify.then(Hasher::new);
        let copied = copy_chunks(
            &mut (&mut *store).take(info.size()),
            writer,
            hasher.as_mut(),
            info.size(),
        )?;
        if copied != info.size() {
            return Err(Error::corrupt(info.data_offset(), "payload is truncated"));
        }

        if let Some(hasher) = hasher {
            let actual = hasher.finalize();
            if actual != info.crc32() {
                return Err(Error::CrcMismatch {
                    name: info.name().to_string(),
                    expected: info.crc32(),
                    actual,
                });
            }
        }

        trace!(name = info.name(), size = copied, "read entry");
        Ok(copied)
    }

    /// Find the first entry called `name`.
    pub fn file_info(&self, name: &str) -> Result<&FileInfo> {
        self.ensure_open("look up entries")?;
        self.index
            .get(name)
            .map(|&idx| &self.directory[idx])
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))
    }

    /// Get every entry in store order.
    pub fn file_infos(&self) -> Result<&[FileInfo]> {
        self.ensure_open("list entries")?;
        Ok(&self.directory)
    }

    /// Get every entry name in store order.
    pub fn file_names(&self) -> Result<Vec<&str>> {
        self.ensure_open("list entries")?;
        Ok(self.directory.iter().map(FileInfo::name).collect())
    }

    /// Write the signature (in writable modes) and flush the store.
    ///
    /// This hands buffered data to the store; for files it reaches the OS,
    /// not necessarily the disk. See [`Archive::sync_all`].
    pub fn flush(&mut self) -> Result<()> {
        let writable = self.is_writable();
        let store = open_store(&mut self.store, "flush")?;

        if writable {
            self.signature.write(store)?;
            self.dirty = false;
        }
        store.flush()?;
        Ok(())
    }

    /// Flush and release the store.
    ///
    /// The store is released even if the flush fails.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open("close")?;

        let result = self.flush();
        self.store = None;
        self.directory.clear();
        self.index.clear();

        debug!("archive closed");
        result
    }

    /// Flush and hand back the store.
    pub fn into_inner(mut self) -> Result<S> {
        self.flush()?;
        self.store.take().ok_or(Error::InvalidState {
            operation: "take the store",
            state: ArchiveState::Closed,
        })
    }

    /// Rebuild the directory by walking every entry after the signature.
    fn rebuild_directory(&mut self) -> Result<()> {
        let size_mode = self.signature.size_mode;
        let crc_enabled = self.signature.crc_enabled;
        let store = open_store(&mut self.store, "scan entries")?;

        let store_len = store.seek(SeekFrom::End(0))?;
        let mut offset = Signature::SIZE as u64;

        // The stored count is only a hint; cap it by what could physically fit.
        let min_entry = header_len(0, size_mode, crc_enabled);
        let hint = self
            .signature
            .file_count
            .min(store_len.saturating_sub(offset) / min_entry);
        let mut directory = Vec::with_capacity(hint as usize);

        store.seek(SeekFrom::Start(offset))?;
        while offset < store_len {
            let header = EntryHeader::read_from(store, size_mode, crc_enabled).map_err(|err| match err {
                Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    Error::corrupt(offset, "entry header is truncated")
                }
                other => other,
            })?;

            // Lossy name decoding can change the name's length, so take the
            // payload offset from the stream rather than the decoded header.
            let data_offset = store.stream_position()?;
            let data_end = data_offset
                .checked_add(header.data_size)
                .filter(|&end| end <= store_len)
                .ok_or_else(|| {
                    Error::corrupt(
                        offset,
                        format!(
                            "payload of {:?} ({} bytes) runs past the end of the store",
                            header.name, header.data_size
                        ),
                    )
                })?;

            trace!(name = %header.name, offset, size = header.data_size, "scanned entry");
            directory.push(FileInfo::new(header, offset, data_offset));

            offset = data_end;
            store.seek(SeekFrom::Start(offset))?;
        }

        let found = directory.len() as u64;
        if found != self.signature.file_count {
            warn!(
                stored = self.signature.file_count,
                found, "stored file count does not match the entries present"
            );
            if self.mode == OpenMode::Append {
                self.signature.file_count = found;
                self.dirty = true;
            }
        }

        let mut index = FxHashMap::default();
        for (idx, info) in directory.iter().enumerate() {
            index.entry(info.name().to_string()).or_insert(idx);
        }

        self.directory = directory;
        self.index = index;
        self.end_offset = offset;
        Ok(())
    }

    /// Check whether an append failed part-way in this session.
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub(crate) fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.store.is_none() {
            return Err(Error::InvalidState {
                operation,
                state: ArchiveState::Closed,
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        self.ensure_open(operation)?;
        if self.mode == OpenMode::Read {
            return Err(Error::InvalidState {
                operation,
                state: ArchiveState::OpenForRead,
            });
        }
        Ok(())
    }
}

impl<S: Read + Write + Seek> Drop for Archive<S> {
    fn drop(&mut self) {
        if self.dirty && self.is_writable() {
            if let Err(e) = self.flush() {
                error!(error = %e, "failed to flush archive on drop");
            }
        }
    }
}

impl<S: Read + Write + Seek> fmt::Debug for Archive<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("state", &self.state())
            .field("signature", &self.signature)
            .field("entries", &self.directory.len())
            .finish()
    }
}

/// Write header and payload at `offset`, patching in the CRC once the payload
/// is through. Returns the CRC (0 when disabled).
fn write_entry<S, R>(
    store: &mut S,
    offset: u64,
    header: &[u8],
    reader: &mut R,
    size: u64,
    crc_enabled: bool,
    name_len: usize,
) -> Result<u32>
where
    S: Write + Seek,
    R: Read,
{
    store.seek(SeekFrom::Start(offset))?;
    store.write_all(header)?;

    let mut hasher = crc_enabled.then(Hasher::new);
    let copied = copy_chunks(&mut reader.take(size), store, hasher.as_mut(), size)?;
    if copied != size {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {size} bytes, source ended after {copied}"),
        )));
    }

    let Some(hasher) = hasher else {
        return Ok(0);
    };
    let crc32 = hasher.finalize();
    // The CRC sits right after the length prefix and the name.
    store.seek(SeekFrom::Start(offset + 1 + name_len as u64))?;
    store.write_u32::<LittleEndian>(crc32)?;
    Ok(crc32)
}

fn open_store<'a, S>(store: &'a mut Option<S>, operation: &'static str) -> Result<&'a mut S> {
    store.as_mut().ok_or(Error::InvalidState {
        operation,
        state: ArchiveState::Closed,
    })
}

/// Copy everything `reader` yields into `writer`, feeding `hasher` on the way.
fn copy_chunks<R, W>(
    reader: &mut R,
    writer: &mut W,
    mut hasher: Option<&mut Hasher>,
    size_hint: u64,
) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; size_hint.clamp(1, BUFFER_SIZE as u64) as usize];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if let Some(hasher) = hasher.as_deref_mut() {
            hasher.update(&buffer[..n]);
        }
        writer.write_all(&buffer[..n])?;
        total += n as u64;
    }

    Ok(total)
}

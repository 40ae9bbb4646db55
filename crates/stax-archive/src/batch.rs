//! Adding files from disk and extracting entries to disk.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::archive::Archive;
use crate::entry::FileInfo;
use crate::{Error, ErrorKind, Result};

/// A file on disk scheduled to be added, with the name it will be stored as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
}

/// Outcome of a batch add or extract.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Entries processed successfully, in order.
    pub succeeded: Vec<FileInfo>,
    /// Entries skipped because of `ignore_errors`, with the reason.
    pub failed: Vec<(String, Error)>,
}

impl BatchReport {
    /// Check whether every entry was processed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Collect the regular files under `root`, sorted by name.
///
/// A file root yields itself under its file name. Files under a directory
/// root are named by their path relative to it with `/` separators, or by
/// their bare file name when `only_names` is set.
pub fn walk_sources<P: AsRef<Path>>(root: P, only_names: bool) -> Result<Vec<SourceFile>> {
    let root = root.as_ref();

    if fs::metadata(root)?.is_file() {
        return Ok(vec![SourceFile {
            path: root.to_path_buf(),
            name: lossy_file_name(root),
        }]);
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = if only_names {
            lossy_file_name(entry.path())
        } else {
            relative_name(root, entry.path())
        };
        sources.push(SourceFile {
            path: entry.into_path(),
            name,
        });
    }

    Ok(sources)
}

fn lossy_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Map an entry name to a path that stays inside the extraction directory.
fn safe_output_path(info: &FileInfo) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for component in info.output_path().components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafePath(info.name().to_string()));
            }
        }
    }

    if path.as_os_str().is_empty() {
        return Err(Error::UnsafePath(info.name().to_string()));
    }
    Ok(path)
}

impl<S: Read + Write + Seek> Archive<S> {
    /// Add a file, or every regular file under a directory.
    pub fn add<P: AsRef<Path>>(&mut self, path: P) -> Result<BatchReport> {
        let sources = walk_sources(path, self.options().only_names)?;
        self.add_sources(&sources, |_| {})
    }

    /// Append each source in order, calling `on_entry` after each attempt.
    ///
    /// With `ignore_errors` set, failing sources are recorded in the report
    /// and the batch carries on.
    pub fn add_sources<F>(&mut self, sources: &[SourceFile], mut on_entry: F) -> Result<BatchReport>
    where
        F: FnMut(&SourceFile),
    {
        self.ensure_writable("add files")?;

        let mut report = BatchReport::default();
        for source in sources {
            match self.append_file(&source.name, &source.path) {
                Ok(info) => {
                    self.log_entry("added", &info);
                    report.succeeded.push(info);
                }
                Err(err) if self.skips(&err) => {
                    warn!(path = %source.path.display(), error = %err, "skipping file");
                    report.failed.push((source.name.clone(), err));
                }
                Err(err) => return Err(err),
            }
            on_entry(source);
        }

        Ok(report)
    }

    /// Extract every entry, or only `entries`, below `destination`.
    pub fn extract<P: AsRef<Path>>(&mut self, destination: P, entries: Option<&[FileInfo]>) -> Result<BatchReport> {
        self.extract_with(destination, entries, |_| {})
    }

    /// Extract the first entry matching each of `names`.
    pub fn extract_names<P, N>(&mut self, destination: P, names: &[N]) -> Result<BatchReport>
    where
        P: AsRef<Path>,
        N: AsRef<str>,
    {
        let entries = names
            .iter()
            .map(|name| self.file_info(name.as_ref()).cloned())
            .collect::<Result<Vec<_>>>()?;
        self.extract(destination, Some(&entries))
    }

    /// Extract entries below `destination`, calling `on_entry` after each.
    ///
    /// `destination` must be an existing directory. Entry names become
    /// relative paths under it; parent directories are created as needed.
    pub fn extract_with<P, F>(
        &mut self,
        destination: P,
        entries: Option<&[FileInfo]>,
        mut on_entry: F,
    ) -> Result<BatchReport>
    where
        P: AsRef<Path>,
        F: FnMut(&FileInfo),
    {
        self.ensure_open("extract")?;
        let scheduled = match entries {
            Some(entries) => entries.to_vec(),
            None => self.file_infos()?.to_vec(),
        };

        let destination = destination.as_ref();
        if !destination.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", destination.display()),
            )));
        }

        let mut report = BatchReport::default();
        for info in scheduled {
            match self.extract_entry(destination, &info) {
                Ok(target) => {
                    debug!(target = %target.display(), "wrote file");
                    self.log_entry("extracted", &info);
                    on_entry(&info);
                    report.succeeded.push(info);
                }
                Err(err) if self.skips(&err) => {
                    warn!(name = info.name(), error = %err, "skipping entry");
                    on_entry(&info);
                    report.failed.push((info.name().to_string(), err));
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }

    fn extract_entry(&mut self, destination: &Path, info: &FileInfo) -> Result<PathBuf> {
        let target = destination.join(safe_output_path(info)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(&target)?);
        let result = self
            .read_into(info, &mut writer)
            .and_then(|_| writer.flush().map_err(Error::from));

        if let Err(err) = result {
            drop(writer);
            // Don't leave a partial file behind.
            let _ = fs::remove_file(&target);
            return Err(err);
        }
        Ok(target)
    }

    /// Whether a per-entry failure is skipped rather than aborting the batch.
    ///
    /// A failure that left partial bytes in the store always aborts.
    fn skips(&self, err: &Error) -> bool {
        self.options().ignore_errors && err.kind() != ErrorKind::InvalidState && !self.is_poisoned()
    }

    fn log_entry(&self, action: &str, info: &FileInfo) {
        if self.options().verbose {
            info!(name = info.name(), size = info.size(), "{action}");
        } else {
            debug!(name = info.name(), size = info.size(), "{action}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{ArchiveOptions, OpenMode, SizeMode};

    fn create(options: ArchiveOptions) -> Archive<Cursor<Vec<u8>>> {
        Archive::from_store(Cursor::new(Vec::new()), OpenMode::Create, SizeMode::M32, options).unwrap()
    }

    fn write_tree(root: &Path) {
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("b.txt"), b"bravo").unwrap();
        fs::write(root.join("a.txt"), b"alpha").unwrap();
        fs::write(root.join("sub/c.bin"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("sub/deeper/d.txt"), b"delta").unwrap();
    }

    #[test]
    fn test_walk_sources_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let names: Vec<_> = walk_sources(dir.path(), false)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["a.txt", "b.txt", "sub/c.bin", "sub/deeper/d.txt"]);
    }

    #[test]
    fn test_walk_sources_only_names() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let names: Vec<_> = walk_sources(dir.path(), true)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["a.txt", "b.txt", "c.bin", "d.txt"]);
    }

    #[test]
    fn test_walk_single_file() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let sources = walk_sources(dir.path().join("sub/c.bin"), false).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "c.bin");
    }

    #[test]
    fn test_add_then_extract_tree() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_tree(src.path());

        let mut archive = create(ArchiveOptions::default());
        let report = archive.add(src.path()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.succeeded.len(), 4);

        let mut seen = 0;
        let report = archive.extract_with(dst.path(), None, |_| seen += 1).unwrap();
        assert_eq!(report.succeeded.len(), 4);
        assert_eq!(seen, 4);

        for name in ["a.txt", "b.txt", "sub/c.bin", "sub/deeper/d.txt"] {
            assert_eq!(
                fs::read(dst.path().join(name)).unwrap(),
                fs::read(src.path().join(name)).unwrap()
            );
        }
    }

    #[test]
    fn test_extract_names_subset() {
        let dst = tempfile::tempdir().unwrap();
        let mut archive = create(ArchiveOptions::default());
        archive.append("keep.txt", b"yes").unwrap();
        archive.append("skip.txt", b"no").unwrap();

        archive.extract_names(dst.path(), &["keep.txt"]).unwrap();
        assert!(dst.path().join("keep.txt").exists());
        assert!(!dst.path().join("skip.txt").exists());

        let err = archive.extract_names(dst.path(), &["nope"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_extract_requires_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = create(ArchiveOptions::default());
        archive.append("a", b"1").unwrap();

        let err = archive.extract(dir.path().join("missing"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_unsafe_names_rejected() {
        let dst = tempfile::tempdir().unwrap();
        let mut archive = create(ArchiveOptions::default());
        archive.append("../escape.txt", b"x").unwrap();
        archive.append("/etc/absolute", b"x").unwrap();
        archive.append("ok/..\\..\\win", b"x").unwrap();

        let err = archive.extract(dst.path(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsafePath);

        archive.options_mut().ignore_errors = true;
        let report = archive.extract(dst.path(), None).unwrap();
        assert_eq!(report.failed.len(), 3);
        assert!(report.succeeded.is_empty());
        assert!(!dst.path().parent().unwrap().join("escape.txt").exists());
    }

    #[test]
    fn test_ignore_errors_continues_extract() {
        let dst = tempfile::tempdir().unwrap();
        let mut archive = create(ArchiveOptions::default().ignore_errors(true));
        archive.append("good.txt", b"fine").unwrap();
        archive.append("bad.txt", b"broken").unwrap();
        archive.append("also-good.txt", b"fine too").unwrap();

        // Flip a payload byte so the second entry fails its CRC.
        let bad = archive.file_info("bad.txt").unwrap().clone();
        let mut store = archive.into_inner().unwrap();
        store.get_mut()[bad.data_offset() as usize] ^= 0x01;
        let mut archive = Archive::from_store(
            store,
            OpenMode::Read,
            SizeMode::M32,
            ArchiveOptions::default().ignore_errors(true),
        )
        .unwrap();

        let report = archive.extract(dst.path(), None).unwrap();
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad.txt");
        assert_eq!(report.failed[0].1.kind(), ErrorKind::Integrity);

        // The failed file is removed rather than left half-written.
        assert!(!dst.path().join("bad.txt").exists());
        assert_eq!(fs::read(dst.path().join("also-good.txt")).unwrap(), b"fine too");
    }

    #[test]
    fn test_add_sources_ignore_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), b"data").unwrap();

        let sources = vec![
            SourceFile {
                path: dir.path().join("gone.txt"),
                name: "gone.txt".into(),
            },
            SourceFile {
                path: dir.path().join("real.txt"),
                name: "real.txt".into(),
            },
        ];

        let mut archive = create(ArchiveOptions::default());
        let err = archive.add_sources(&sources, |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        archive.options_mut().ignore_errors = true;
        let mut progress = Vec::new();
        let report = archive
            .add_sources(&sources, |s| progress.push(s.name.clone()))
            .unwrap();
        assert_eq!(progress, ["gone.txt", "real.txt"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(archive.file_names().unwrap(), ["real.txt"]);
    }

    #[test]
    fn test_add_sources_aborts_after_partial_write() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("next.txt"), b"data").unwrap();
        let sources = vec![SourceFile {
            path: dir.path().join("next.txt"),
            name: "next.txt".into(),
        }];

        let mut archive = create(ArchiveOptions::default().ignore_errors(true));
        let mut failing = io::Read::chain(&b"partial"[..], FailingReader);
        assert!(archive.append_from("broken", &mut failing, 100).is_err());

        // Skipping would leave an archive that no longer opens.
        let err = archive.add_sources(&sources, |_| {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert_eq!(archive.file_count(), 0);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "read failed"))
        }
    }

    #[test]
    fn test_add_requires_writable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let archive = create(ArchiveOptions::default());
        let store = archive.into_inner().unwrap();
        let mut archive = Archive::from_store(
            store,
            OpenMode::Read,
            SizeMode::M32,
            ArchiveOptions::default().ignore_errors(true),
        )
        .unwrap();

        let err = archive.add(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}

//! Append-only output mailboxes, one file per destination key.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tracing::{debug, trace};

use crate::config::WriteMode;
use crate::error::{Result, SplitError};
use crate::model::key::DestinationKey;

/// Buffer size for held-open writers.
const WRITER_BUFFER_SIZE: usize = 64 * 1024;

/// The set of output files under one directory.
///
/// In [`WriteMode::Reopen`] every append opens the file, writes and closes
/// it again. In [`WriteMode::Held`] a buffered writer per key is kept in an
/// LRU cache; a writer pushed out of the cache is flushed first, so bytes
/// for one key always land in the order they were appended.
pub struct OutputSet {
    dir: PathBuf,
    writers: Option<LruCache<DestinationKey, BufWriter<File>>>,
}

impl OutputSet {
    /// Prepare `dir` for output.
    ///
    /// When the directory is missing it is created if `create_dir` is set,
    /// otherwise [`SplitError::OutputDirMissing`] is returned.
    pub fn open(
        dir: impl AsRef<Path>,
        create_dir: bool,
        mode: WriteMode,
        max_open_files: usize,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(SplitError::NotADirectory(dir)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !create_dir {
                    return Err(SplitError::OutputDirMissing(dir));
                }
                std::fs::create_dir_all(&dir).map_err(|e| SplitError::io(&dir, e))?;
                debug!(dir = %dir.display(), "Created output directory");
            }
            Err(e) => return Err(SplitError::io(&dir, e)),
        }

        let writers = match mode {
            WriteMode::Reopen => None,
            WriteMode::Held => {
                let cap = NonZeroUsize::new(max_open_files).unwrap_or(NonZeroUsize::MIN);
                Some(LruCache::new(cap))
            }
        };

        Ok(Self { dir, writers })
    }

    /// Directory the files are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of the file for `key`.
    pub fn path_for(&self, key: &DestinationKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Append `bytes` verbatim to the file for `key`, creating it if needed.
    pub fn append(&mut self, key: &DestinationKey, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let Some(writers) = self.writers.as_mut() else {
            let mut file = open_append(&path)?;
            file.write_all(bytes).map_err(|e| SplitError::io(&path, e))?;
            return Ok(());
        };

        if let Some(writer) = writers.get_mut(key) {
            return writer
                .write_all(bytes)
                .map_err(|e| SplitError::io(&path, e));
        }

        let mut writer = BufWriter::with_capacity(WRITER_BUFFER_SIZE, open_append(&path)?);
        writer
            .write_all(bytes)
            .map_err(|e| SplitError::io(&path, e))?;
        if let Some((evicted_key, mut evicted)) = writers.push(*key, writer) {
            trace!(key = %evicted_key, "Closing least recently used output file");
            evicted
                .flush()
                .map_err(|e| SplitError::io(self.dir.join(evicted_key.file_name()), e))?;
        }
        Ok(())
    }

    /// Flush and close every held writer.
    pub fn finish(mut self) -> Result<()> {
        self.flush_all()
    }

    fn flush_all(&mut self) -> Result<()> {
        if let Some(writers) = self.writers.as_mut() {
            while let Some((key, mut writer)) = writers.pop_lru() {
                writer
                    .flush()
                    .map_err(|e| SplitError::io(self.dir.join(key.file_name()), e))?;
            }
        }
        Ok(())
    }
}

impl Drop for OutputSet {
    fn drop(&mut self) {
        // Errors here were already reported by `finish` or are unreportable.
        let _ = self.flush_all();
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SplitError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, month: u32) -> DestinationKey {
        DestinationKey::Month { year, month }
    }

    #[test]
    fn test_reopen_appends_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let mut out = OutputSet::open(tmp.path(), false, WriteMode::Reopen, 0).unwrap();
        out.append(&month(2023, 4), b"one\n").unwrap();
        out.append(&DestinationKey::Broken, b"bad\n").unwrap();
        out.append(&month(2023, 4), b"two\n").unwrap();
        out.finish().unwrap();

        let got = std::fs::read(tmp.path().join("mail-2304")).unwrap();
        assert_eq!(got, b"one\ntwo\n");
        let got = std::fs::read(tmp.path().join("mail-broken")).unwrap();
        assert_eq!(got, b"bad\n");
    }

    #[test]
    fn test_existing_files_are_appended_to() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("mail-2304"), b"old\n").unwrap();
        let mut out = OutputSet::open(tmp.path(), false, WriteMode::Reopen, 0).unwrap();
        out.append(&month(2023, 4), b"new\n").unwrap();
        out.finish().unwrap();
        let got = std::fs::read(tmp.path().join("mail-2304")).unwrap();
        assert_eq!(got, b"old\nnew\n");
    }

    #[test]
    fn test_held_with_eviction_keeps_order() {
        let tmp = tempfile::tempdir().unwrap();
        // Room for a single open file: every key switch evicts.
        let mut out = OutputSet::open(tmp.path(), false, WriteMode::Held, 1).unwrap();
        out.append(&month(2023, 4), b"a1\n").unwrap();
        out.append(&month(2023, 5), b"b1\n").unwrap();
        out.append(&month(2023, 4), b"a2\n").unwrap();
        out.append(&month(2023, 4), b"a3\n").unwrap();
        out.append(&month(2023, 5), b"b2\n").unwrap();
        out.finish().unwrap();

        assert_eq!(
            std::fs::read(tmp.path().join("mail-2304")).unwrap(),
            b"a1\na2\na3\n"
        );
        assert_eq!(
            std::fs::read(tmp.path().join("mail-2305")).unwrap(),
            b"b1\nb2\n"
        );
    }

    #[test]
    fn test_held_flushes_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut out = OutputSet::open(tmp.path(), false, WriteMode::Held, 8).unwrap();
            out.append(&DestinationKey::Broken, b"x\n").unwrap();
        }
        assert_eq!(
            std::fs::read(tmp.path().join("mail-broken")).unwrap(),
            b"x\n"
        );
    }

    #[test]
    fn test_creates_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("split");
        let out = OutputSet::open(&dir, true, WriteMode::Reopen, 0).unwrap();
        assert!(dir.is_dir());
        assert_eq!(out.dir(), dir.as_path());
    }

    #[test]
    fn test_missing_dir_without_create() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("split");
        let result = OutputSet::open(&dir, false, WriteMode::Reopen, 0);
        assert!(matches!(result, Err(SplitError::OutputDirMissing(_))));
        assert!(!dir.exists());
    }

    #[test]
    fn test_output_path_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("split");
        std::fs::write(&file, b"").unwrap();
        let result = OutputSet::open(&file, true, WriteMode::Reopen, 0);
        assert!(matches!(result, Err(SplitError::NotADirectory(_))));
    }

    #[test]
    fn test_nothing_written_creates_no_files() {
        let tmp = tempfile::tempdir().unwrap();
        let out = OutputSet::open(tmp.path(), false, WriteMode::Held, 4).unwrap();
        out.finish().unwrap();
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}

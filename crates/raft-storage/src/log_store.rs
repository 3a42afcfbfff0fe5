//! # log_store
//!
//! why: the replicated log must only ever grow, and must come back identical after a crash
//! relations: frames entries with raft_core::record_stream, wrapped by FileStorage in lib.rs
//! what: LogStore
//!
//! Recovery policy: any corrupt or truncated record fails the open. The good
//! prefix is reported in the error and can be inspected with `LogStore::scan`,
//! but nothing is truncated automatically; that call belongs to an operator.
//!
//! A failed append is rolled back to the length the file had before it, so a
//! rejected write never leaves a torn tail behind acknowledged entries. If the
//! rollback itself fails the store refuses every later append.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use raft_core::{decode_all, encode_all, Decoded, Error, LogEntry, Result};

use crate::durable::{write_checked, AppendFile};

/// durable append-only store for the ordered log entries
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
    poisoned: bool,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poisoned: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// true once a failed append could not be rolled back
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Load every entry, creating an empty log file if none exists. The flag
    /// is true when the log was absent or empty.
    pub fn open_or_create(&self) -> Result<(Vec<LogEntry>, bool)> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| Error::io("open log file", &self.path, e))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| Error::io("read log file", &self.path, e))?;
        if content.is_empty() {
            info!("starting with empty log at {}", self.path.display());
            return Ok((Vec::new(), true));
        }

        let decoded = decode_all::<LogEntry>(&content);
        if let Some(e) = &decoded.error {
            error!(
                "log file {} is unreadable after {} good entries: {}",
                self.path.display(),
                decoded.records.len(),
                e
            );
        }
        let entries = decoded.into_result()?;
        info!(
            "recovered {} log entries from {}",
            entries.len(),
            self.path.display()
        );
        Ok((entries, false))
    }

    /// Read-only scan returning the decodable prefix and, if the file does
    /// not end cleanly, the error that stopped the scan. A missing file scans
    /// as empty.
    pub fn scan(&self) -> Result<Decoded<LogEntry>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::io("read log file", &self.path, e)),
        };
        Ok(decode_all(&content))
    }

    /// Append `entries` in order with a single write, then sync.
    ///
    /// No consistency checks against the existing log are made here.
    pub fn append(&mut self, entries: &[LogEntry]) -> Result<()> {
        if self.poisoned {
            return Err(Error::LogPoisoned {
                path: self.path.clone(),
            });
        }
        if entries.is_empty() {
            return Err(Error::InvalidArgument(
                "append needs at least one entry".into(),
            ));
        }
        let buf = encode_all(entries)?;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| Error::io("open log file for append", &self.path, e))?;
        self.append_to(&mut file, &buf)
    }

    fn append_to<F: AppendFile>(&mut self, file: &mut F, buf: &[u8]) -> Result<()> {
        if self.poisoned {
            return Err(Error::LogPoisoned {
                path: self.path.clone(),
            });
        }
        let prev_len = file
            .current_len()
            .map_err(|e| Error::io("stat log file", &self.path, e))?;

        let outcome = write_checked(file, buf, &self.path).and_then(|()| {
            file.sync()
                .map_err(|e| Error::io("sync log file", &self.path, e))
        });
        let Err(e) = outcome else {
            return Ok(());
        };

        match file.truncate_to(prev_len).and_then(|()| file.sync()) {
            Ok(()) => warn!(
                "rolled back failed append to {} at {} bytes: {}",
                self.path.display(),
                prev_len,
                e
            ),
            Err(rollback) => {
                self.poisoned = true;
                error!(
                    "could not roll back failed append to {}: {}; refusing further appends",
                    self.path.display(),
                    rollback
                );
            }
        }
        Err(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::{self, Write};
    use tempfile::tempdir;

    /// in-memory file taking at most `write_limit` bytes per write
    struct FlakyFile {
        data: Vec<u8>,
        write_limit: usize,
        sync_failures: usize,
        fail_truncate: bool,
    }

    impl FlakyFile {
        fn holding(data: &[u8]) -> Self {
            Self {
                data: data.to_vec(),
                write_limit: usize::MAX,
                sync_failures: 0,
                fail_truncate: false,
            }
        }
    }

    impl Write for FlakyFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.write_limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl AppendFile for FlakyFile {
        fn current_len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            if self.fail_truncate {
                return Err(io::Error::new(io::ErrorKind::Other, "read-only"));
            }
            self.data.truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            if self.sync_failures > 0 {
                self.sync_failures -= 1;
                return Err(io::Error::new(io::ErrorKind::Other, "fsync failed"));
            }
            Ok(())
        }
    }

    /// real log file that only accepts the first `limit` bytes of a write
    struct CappedFile {
        file: File,
        limit: usize,
    }

    impl Write for CappedFile {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.file.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    impl AppendFile for CappedFile {
        fn current_len(&self) -> io::Result<u64> {
            self.file.current_len()
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.file.truncate_to(len)
        }

        fn sync(&mut self) -> io::Result<()> {
            self.file.sync()
        }
    }

    fn entry(term: u64, command: &str) -> LogEntry {
        LogEntry::new(term, command.as_bytes().to_vec())
    }

    #[test]
    fn absent_file_opens_empty_and_is_created() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("log"));

        let (entries, created) = store.open_or_create().unwrap();
        assert!(created);
        assert!(entries.is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn appended_entries_come_back_in_order() {
        let dir = tempdir().unwrap();
        let mut store = LogStore::new(dir.path().join("log"));

        store.append(&[entry(1, "a"), entry(1, "b")]).unwrap();
        store.append(&[entry(2, "c")]).unwrap();

        let (entries, created) = store.open_or_create().unwrap();
        assert!(!created);
        assert_eq!(entries, vec![entry(1, "a"), entry(1, "b"), entry(2, "c")]);
    }

    #[test]
    fn empty_append_is_rejected_without_touching_file() {
        let dir = tempdir().unwrap();
        let mut store = LogStore::new(dir.path().join("log"));

        assert!(matches!(store.append(&[]), Err(Error::InvalidArgument(_))));
        assert!(!store.path().exists());
    }

    #[test]
    fn torn_tail_fails_open_but_scan_shows_prefix() {
        let dir = tempdir().unwrap();
        let mut store = LogStore::new(dir.path().join("log"));
        store.append(&[entry(1, "a"), entry(1, "b")]).unwrap();

        let mut raw = fs::read(store.path()).unwrap();
        raw.extend_from_slice(&[9, 0, 0]);
        fs::write(store.path(), &raw).unwrap();

        let err = store.open_or_create().unwrap_err();
        assert!(matches!(
            err,
            Error::CorruptRecord {
                good_records: 2,
                ..
            }
        ));

        let scanned = store.scan().unwrap();
        assert_eq!(scanned.records, vec![entry(1, "a"), entry(1, "b")]);
        assert!(!scanned.is_clean());
        // nothing was truncated
        assert_eq!(fs::read(store.path()).unwrap(), raw);
    }

    #[test]
    fn scan_of_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let scanned = LogStore::new(dir.path().join("log")).scan().unwrap();
        assert!(scanned.is_clean());
        assert!(scanned.records.is_empty());
    }

    #[test]
    fn append_into_missing_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let mut store = LogStore::new(dir.path().join("gone").join("log"));
        assert!(matches!(
            store.append(&[entry(1, "a")]),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn short_write_is_rolled_back() {
        let mut store = LogStore::new("log");
        let mut file = FlakyFile::holding(b"existing");
        file.write_limit = 3;

        let buf = encode_all(&[entry(1, "a")]).unwrap();
        let err = store.append_to(&mut file, &buf).unwrap_err();

        assert!(matches!(err, Error::WriteIntegrity { written: 3, .. }));
        assert_eq!(file.data, b"existing");
        assert!(!store.is_poisoned());
    }

    #[test]
    fn failed_sync_is_rolled_back() {
        let mut store = LogStore::new("log");
        let mut file = FlakyFile::holding(b"");
        file.sync_failures = 1;

        let buf = encode_all(&[entry(1, "a")]).unwrap();
        assert!(matches!(
            store.append_to(&mut file, &buf),
            Err(Error::Io {
                operation: "sync log file",
                ..
            })
        ));
        assert!(file.data.is_empty());
        assert!(!store.is_poisoned());
    }

    #[test]
    fn failed_rollback_poisons_the_store() {
        let dir = tempdir().unwrap();
        let mut store = LogStore::new(dir.path().join("log"));
        store.append(&[entry(1, "a")]).unwrap();
        let before = fs::read(store.path()).unwrap();

        let mut file = FlakyFile::holding(b"");
        file.write_limit = 2;
        file.fail_truncate = true;
        let buf = encode_all(&[entry(1, "b")]).unwrap();
        assert!(store.append_to(&mut file, &buf).is_err());
        assert!(store.is_poisoned());

        assert!(matches!(
            store.append(&[entry(1, "c")]),
            Err(Error::LogPoisoned { .. })
        ));
        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn log_stays_readable_after_rejected_append() {
        let dir = tempdir().unwrap();
        let mut store = LogStore::new(dir.path().join("log"));
        store.append(&[entry(1, "small")]).unwrap();

        let big = entry(1, &"x".repeat(20_000));
        let mut capped = CappedFile {
            file: OpenOptions::new().append(true).open(store.path()).unwrap(),
            limit: 8_000,
        };
        let buf = encode_all(&[big]).unwrap();
        assert!(matches!(
            store.append_to(&mut capped, &buf),
            Err(Error::WriteIntegrity { .. })
        ));
        drop(capped);

        store.append(&[entry(2, "after")]).unwrap();
        let (entries, _) = store.open_or_create().unwrap();
        assert_eq!(entries, vec![entry(1, "small"), entry(2, "after")]);
    }
}

//! # term_store
//!
//! why: the current term and vote must survive a crash, and must never be left torn
//! relations: wrapped by FileStorage in lib.rs, opened at startup by open_node
//! what: TermStateStore
//!
//! The file holds exactly one encoded `TermRecord` with no framing. Updates are
//! staged in a sibling `.tmp` file, synced, then renamed over the live file.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::info;
use raft_core::{Error, Record, Result, TermRecord};

use crate::durable::{sync_parent_dir, temp_path_for, write_checked};

/// durable single-record store for (current term, vote)
#[derive(Debug, Clone)]
pub struct TermStateStore {
    path: PathBuf,
}

impl TermStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored record, initializing the file with term 0 and no vote
    /// when it is absent or empty. The flag is true when the file was
    /// initialized by this call.
    pub fn open_or_create(&self) -> Result<(TermRecord, bool)> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::io("open term file", &self.path, e)),
        };

        if content.is_empty() {
            let record = TermRecord::default();
            self.update(&record)?;
            info!("created term file {}", self.path.display());
            return Ok((record, true));
        }

        let record = TermRecord::decode_payload(&content).map_err(|e| match e {
            Error::Decode { what, reason } => Error::Decode {
                what,
                reason: format!("{}: {reason}", self.path.display()),
            },
            other => other,
        })?;
        Ok((record, false))
    }

    /// Replace the stored record. Returns once the new record is durable.
    ///
    /// A failed write, sync or rename removes the staging file.
    pub fn update(&self, record: &TermRecord) -> Result<()> {
        let content = record.encode_payload()?;
        let staging = temp_path_for(&self.path);

        if let Err(e) = self.stage_and_replace(&staging, &content) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        sync_parent_dir(&self.path)
    }

    fn stage_and_replace(&self, staging: &Path, content: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(staging)
            .map_err(|e| Error::io("open term staging file", staging, e))?;
        write_checked(&mut file, content, staging)?;
        file.sync_all()
            .map_err(|e| Error::io("sync term staging file", staging, e))?;
        drop(file);

        fs::rename(staging, &self.path).map_err(|e| Error::io("replace term file", &self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absent_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let store = TermStateStore::new(dir.path().join("term"));

        let (record, created) = store.open_or_create().unwrap();
        assert!(created);
        assert_eq!(record, TermRecord::new(0, None));
        assert!(store.path().exists());
    }

    #[test]
    fn second_open_finds_existing_record() {
        let dir = tempdir().unwrap();
        let store = TermStateStore::new(dir.path().join("term"));
        store.open_or_create().unwrap();

        let (record, created) = store.open_or_create().unwrap();
        assert!(!created);
        assert_eq!(record, TermRecord::default());
    }

    #[test]
    fn empty_file_is_treated_as_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("term");
        fs::write(&path, b"").unwrap();

        let (record, created) = TermStateStore::new(&path).open_or_create().unwrap();
        assert!(created);
        assert_eq!(record, TermRecord::default());
        assert!(!fs::read(&path).unwrap().is_empty());
    }

    #[test]
    fn update_replaces_record() {
        let dir = tempdir().unwrap();
        let store = TermStateStore::new(dir.path().join("term"));
        store.open_or_create().unwrap();

        store.update(&TermRecord::new(12, Some(4))).unwrap();
        store.update(&TermRecord::new(13, None)).unwrap();

        let (record, created) = store.open_or_create().unwrap();
        assert!(!created);
        assert_eq!(record, TermRecord::new(13, None));
        assert!(!temp_path_for(store.path()).exists());
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("term");
        fs::write(&path, b"\x08\x05\x10").unwrap();

        let err = TermStateStore::new(&path).open_or_create().unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.to_string().contains("term"));
    }

    #[test]
    fn failed_replace_leaves_no_staging_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("term");
        // a non-empty directory in the way makes the rename fail
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupant"), b"x").unwrap();
        let store = TermStateStore::new(&path);

        let err = store.update(&TermRecord::new(2, Some(1))).unwrap_err();
        assert!(matches!(
            err,
            Error::Io {
                operation: "replace term file",
                ..
            }
        ));
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn unreachable_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let store = TermStateStore::new(dir.path().join("missing").join("term"));

        assert!(matches!(store.open_or_create(), Err(Error::Io { .. })));
    }
}

//! # raft-storage
//!
//! why: provide durable, crash-recoverable persistence for raft state using standard rust fs apis
//! relations: implements raft_core::Storage, used by raft-node at startup
//! what: TermStateStore, LogStore, FileStorage, InMemoryStorage for testing, open_node bootstrap

mod durable;
pub mod log_store;
pub mod term_store;

use std::fs;
use std::path::Path;

use log::info;
use raft_core::{Error, LogEntry, NodeConfig, RaftNode, Result, Storage, TermRecord};

pub use log_store::LogStore;
pub use term_store::TermStateStore;

// -- file storage implementation --

/// file-based storage: one term file and one append-only log file
///
/// Every operation opens, writes and releases its own file handle; no handle
/// is held between calls.
#[derive(Debug, Clone)]
pub struct FileStorage {
    term: TermStateStore,
    log: LogStore,
}

impl FileStorage {
    pub fn new(term: TermStateStore, log: LogStore) -> Self {
        Self { term, log }
    }

    pub fn term_store(&self) -> &TermStateStore {
        &self.term
    }

    pub fn log_store(&self) -> &LogStore {
        &self.log
    }
}

impl Storage for FileStorage {
    fn save_term(&mut self, record: &TermRecord) -> Result<()> {
        self.term.update(record)
    }

    fn append_entries(&mut self, entries: &[LogEntry]) -> Result<()> {
        self.log.append(entries)
    }
}

/// Recover both stores named by `config` and build a follower node on top of
/// them. Any error here must stop startup.
pub fn open_node(config: &NodeConfig) -> Result<RaftNode<FileStorage>> {
    config.validate()?;
    let id = config
        .local_id()
        .ok_or_else(|| Error::Config("no server is marked local".into()))?;

    ensure_parent_dir(&config.term_info_path)?;
    ensure_parent_dir(&config.log_path)?;

    let term_store = TermStateStore::new(&config.term_info_path);
    let (term, term_created) = term_store.open_or_create()?;
    if term_created {
        info!("created new term record");
    }
    info!(
        "current term {}, voted for {:?}",
        term.current_term, term.voted_for
    );

    let log_store = LogStore::new(&config.log_path);
    let (entries, _) = log_store.open_or_create()?;

    Ok(RaftNode::new(
        id,
        config.peer_ids(),
        term,
        entries,
        FileStorage::new(term_store, log_store),
    ))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| Error::io("create data directory", dir, e))
        }
        _ => Ok(()),
    }
}

// -- in-memory storage implementation --

/// in-memory storage for testing
///
/// stores all state in memory, no persistence across restarts. Writes can be
/// made to fail to exercise error paths.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    term: TermRecord,
    log: Vec<LogEntry>,
    fail_writes: bool,
}

impl InMemoryStorage {
    /// create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// make every following write fail (or succeed again)
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn term(&self) -> TermRecord {
        self.term
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(Error::io(
                "write",
                "<memory>",
                std::io::Error::new(std::io::ErrorKind::Other, "injected write failure"),
            ));
        }
        Ok(())
    }
}

impl Storage for InMemoryStorage {
    fn save_term(&mut self, record: &TermRecord) -> Result<()> {
        self.check_writable()?;
        self.term = *record;
        Ok(())
    }

    fn append_entries(&mut self, entries: &[LogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Err(Error::InvalidArgument(
                "append needs at least one entry".into(),
            ));
        }
        self.check_writable()?;
        self.log.extend_from_slice(entries);
        Ok(())
    }
}

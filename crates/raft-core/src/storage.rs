//! # storage
//!
//! why: the state machine must make term changes and new entries durable before acting on them
//! relations: implemented by raft-storage (files, in-memory), driven by node.rs
//! what: Storage trait

use crate::error::Result;
use crate::log::LogEntry;
use crate::term::TermRecord;

/// Durable sink for the two pieces of state raft safety depends on.
///
/// Both methods must return only after the write is durable. Neither is safe to
/// call concurrently; the caller serializes all transitions of a node.
pub trait Storage {
    /// Replace the stored term record.
    fn save_term(&mut self, record: &TermRecord) -> Result<()>;

    /// Append `entries` to the end of the stored log, in order. An empty slice
    /// is rejected with `Error::InvalidArgument`.
    fn append_entries(&mut self, entries: &[LogEntry]) -> Result<()>;
}

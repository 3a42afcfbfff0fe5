//! # error
//!
//! why: give every failure in the persistence layer and the role state machine a name
//! relations: returned by codec.rs, record_stream.rs, node.rs, config.rs and raft-storage
//! what: Error enum, Result alias

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::node::NodeState;

/// Convenience alias used throughout the workspace
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// filesystem open/read/write/sync failure, passed through unmodified
    #[error("{operation} failed for {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// a whole-file record (the term file) could not be decoded
    #[error("could not decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// malformed or truncated framed record inside a record stream
    #[error("corrupt record at byte offset {offset} ({good_records} good records before it): {reason}")]
    CorruptRecord {
        offset: usize,
        good_records: usize,
        reason: String,
    },

    /// a read was attempted after the stream already failed to decode
    #[error("record stream is invalid after an earlier decode failure")]
    StreamInvalid,

    /// the write call returned fewer bytes than were handed to it
    #[error("short write to {}: wrote {written} of {expected} bytes", .path.display())]
    WriteIntegrity {
        path: PathBuf,
        written: usize,
        expected: usize,
    },

    /// a failed append could not be rolled back, so the file tail is unknown
    #[error("log file {} holds a partial append that could not be rolled back; refusing writes", .path.display())]
    LogPoisoned { path: PathBuf },

    #[error("could not encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("illegal transition: {operation} is not allowed from {from:?}")]
    IllegalTransition {
        from: NodeState,
        operation: &'static str,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an io error with the operation and path it happened on
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

//! # raft-core
//!
//! why: the durable-state contract and role state machine of a raft node, free of any I/O
//! relations: raft-storage implements `Storage` on files, raft-node wires both together at startup
//! what: error taxonomy, record codec and framing, term record, log entry, replication bookkeeping, node

pub mod codec;
pub mod config;
pub mod error;
pub mod log;
pub mod node;
pub mod record_stream;
pub mod replication;
pub mod storage;
pub mod term;

pub use codec::Record;
pub use config::{NodeConfig, ServerEntry};
pub use error::{Error, Result};
pub use crate::log::{LogEntry, LogIndex, Term};
pub use node::{NodeState, RaftNode};
pub use record_stream::{decode_all, encode_all, encode_one, Decoded, RecordStream};
pub use replication::{ReplicationProgress, ReplicationTracker};
pub use storage::Storage;
pub use term::{NodeId, TermRecord};

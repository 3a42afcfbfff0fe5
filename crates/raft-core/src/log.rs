//! # log
//!
//! why: the unit of replication, stored back to back in the append-only log file
//! relations: framed by record_stream.rs, persisted via raft-storage, mirrored by node.rs
//! what: LogEntry struct, Term / LogIndex aliases

use serde::{Deserialize, Serialize};

use crate::codec::{self, Record};
use crate::error::Result;

/// Election term number
pub type Term = u64;

/// 1-based position of an entry in the log; 0 means "no entry"
pub type LogIndex = u64;

/// A single entry in the replicated log
///
/// The index is never stored: it is the entry's 1-based position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// The term when this entry was created
    pub term: Term,
    /// Opaque command bytes, applied to the state machine once committed
    pub command: Vec<u8>,
}

impl LogEntry {
    /// Create a new log entry
    pub fn new(term: Term, command: Vec<u8>) -> Self {
        Self { term, command }
    }
}

impl Record for LogEntry {
    const KIND: &'static str = "log entry";

    fn encode_payload(&self) -> Result<Vec<u8>> {
        codec::to_json(Self::KIND, self)
    }

    fn decode_payload(bytes: &[u8]) -> Result<Self> {
        codec::from_json(Self::KIND, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn payload_keeps_term_and_command() {
        let entry = LogEntry::new(7, b"set x 1".to_vec());
        let bytes = entry.encode_payload().unwrap();
        assert_eq!(LogEntry::decode_payload(&bytes).unwrap(), entry);
    }

    #[test]
    fn empty_command_is_allowed() {
        let entry = LogEntry::new(1, Vec::new());
        let bytes = entry.encode_payload().unwrap();
        assert_eq!(LogEntry::decode_payload(&bytes).unwrap().command, Vec::<u8>::new());
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let err = LogEntry::decode_payload(b"\x00\xffnot json").unwrap_err();
        assert!(matches!(err, Error::Decode { what: "log entry", .. }));
    }
}

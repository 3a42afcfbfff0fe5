//! # term
//!
//! why: the (current term, vote) pair that raft safety depends on surviving a crash
//! relations: persisted whole-file by raft-storage's TermStateStore, loaded into node.rs
//! what: TermRecord struct, NodeId alias

use serde::{Deserialize, Serialize};

use crate::codec::{self, Record};
use crate::error::Result;
use crate::log::Term;

/// Identifier of a server in the cluster
pub type NodeId = u64;

/// Durable term/vote state. Exactly one is live per node.
///
/// `voted_for` is `None` when no vote has been cast in `current_term`; it is
/// serialized as `null`, so no peer id is reserved as a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TermRecord {
    pub current_term: Term,
    pub voted_for: Option<NodeId>,
}

impl TermRecord {
    pub fn new(current_term: Term, voted_for: Option<NodeId>) -> Self {
        Self {
            current_term,
            voted_for,
        }
    }

    /// Record for a later term; the vote never carries over.
    pub fn advance_to(&self, term: Term) -> Self {
        Self::new(term, None)
    }
}

impl Record for TermRecord {
    const KIND: &'static str = "term record";

    fn encode_payload(&self) -> Result<Vec<u8>> {
        codec::to_json(Self::KIND, self)
    }

    fn decode_payload(bytes: &[u8]) -> Result<Self> {
        codec::from_json(Self::KIND, bytes)
    }
}

//! # node
//!
//! why: define the raft node state machine and its durable state transitions
//! relations: persists through storage.rs, tracks followers with replication.rs, mirrors log.rs entries
//! what: NodeState enum, RaftNode struct, role transitions, commit/apply indices

use ::log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::log::{LogEntry, LogIndex, Term};
use crate::replication::ReplicationTracker;
use crate::storage::Storage;
use crate::term::{NodeId, TermRecord};

/// The three possible states a Raft node can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    /// Passive state - listens for heartbeats, votes when asked
    Follower,
    /// Transitional state - requesting votes to become leader
    Candidate,
    /// Active state - manages log replication, sends heartbeats
    Leader,
}

impl Default for NodeState {
    fn default() -> Self {
        Self::Follower
    }
}

/// A single Raft node in the cluster
///
/// Holds the authoritative in-memory copy of the node's term, vote, log and
/// indices. Every transition that changes durable state writes through
/// `storage` first and only then touches memory, so a failed write leaves the
/// node exactly as it was.
#[derive(Debug)]
pub struct RaftNode<S> {
    id: NodeId,
    peers: Vec<NodeId>,
    state: NodeState,
    term: TermRecord,
    commit_index: LogIndex,
    last_applied: LogIndex,
    log: Vec<LogEntry>,
    replication: ReplicationTracker,
    storage: S,
}

impl<S: Storage> RaftNode<S> {
    /// Create a node in Follower state from recovered durable state.
    ///
    /// `peers` may include `id`; it is filtered out.
    pub fn new(
        id: NodeId,
        mut peers: Vec<NodeId>,
        term: TermRecord,
        log: Vec<LogEntry>,
        storage: S,
    ) -> Self {
        peers.retain(|peer| *peer != id);
        Self {
            id,
            peers,
            state: NodeState::Follower,
            term,
            commit_index: 0,
            last_applied: 0,
            log,
            replication: ReplicationTracker::new(),
            storage,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn peers(&self) -> &[NodeId] {
        &self.peers
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn current_term(&self) -> Term {
        self.term.current_term
    }

    pub fn voted_for(&self) -> Option<NodeId> {
        self.term.voted_for
    }

    pub fn term_record(&self) -> TermRecord {
        self.term
    }

    pub fn commit_index(&self) -> LogIndex {
        self.commit_index
    }

    pub fn last_applied(&self) -> LogIndex {
        self.last_applied
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Entry at a 1-based index
    pub fn entry(&self, index: LogIndex) -> Option<&LogEntry> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.log.get(position)
    }

    pub fn last_log_index(&self) -> LogIndex {
        self.log.len() as LogIndex
    }

    /// Term of the last entry, 0 for an empty log
    pub fn last_log_term(&self) -> Term {
        self.log.last().map_or(0, |entry| entry.term)
    }

    /// Follower progress; only meaningful while leading.
    pub fn replication(&self) -> Option<&ReplicationTracker> {
        (self.state == NodeState::Leader).then_some(&self.replication)
    }

    pub fn replication_mut(&mut self) -> Option<&mut ReplicationTracker> {
        if self.state == NodeState::Leader {
            Some(&mut self.replication)
        } else {
            None
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Start an election: next term, vote for self, persisted before the
    /// role changes.
    pub fn become_candidate(&mut self) -> Result<()> {
        if self.state == NodeState::Leader {
            return Err(self.illegal("become_candidate"));
        }
        let next_term = self.term.current_term.checked_add(1).ok_or_else(|| {
            Error::InvalidArgument("term counter would overflow".into())
        })?;
        let record = TermRecord::new(next_term, Some(self.id));
        self.storage.save_term(&record)?;

        self.term = record;
        self.state = NodeState::Candidate;
        info!("node {} is candidate for term {}", self.id, next_term);
        Ok(())
    }

    /// Take leadership after winning an election.
    pub fn become_leader(&mut self) -> Result<()> {
        if self.state != NodeState::Candidate {
            return Err(self.illegal("become_leader"));
        }
        let last_log_index = self.last_log_index();
        self.state = NodeState::Leader;
        self.replication
            .reset(self.peers.iter().copied(), last_log_index);
        info!(
            "node {} is leader for term {} with {} peers",
            self.id,
            self.term.current_term,
            self.peers.len()
        );
        Ok(())
    }

    /// Step down. A newer term is persisted (with the vote cleared) before the
    /// role changes; an equal or older term leaves durable state alone.
    pub fn become_follower(&mut self, new_term: Term) -> Result<()> {
        if new_term > self.term.current_term {
            let record = self.term.advance_to(new_term);
            self.storage.save_term(&record)?;
            self.term = record;
        } else if new_term < self.term.current_term {
            debug!(
                "node {} ignoring stale term {} (current {})",
                self.id, new_term, self.term.current_term
            );
        }

        if self.state != NodeState::Follower {
            info!(
                "node {} steps down to follower in term {}",
                self.id, self.term.current_term
            );
        }
        self.state = NodeState::Follower;
        self.replication.clear();
        Ok(())
    }

    /// Durably append entries, then mirror them in memory. Returns the new
    /// last log index.
    pub fn append_entries(&mut self, entries: &[LogEntry]) -> Result<LogIndex> {
        if entries.is_empty() {
            return Err(Error::InvalidArgument("no entries to append".into()));
        }
        self.storage.append_entries(entries)?;
        self.log.extend_from_slice(entries);
        debug!(
            "node {} appended {} entries, last index {}",
            self.id,
            entries.len(),
            self.last_log_index()
        );
        Ok(self.last_log_index())
    }

    /// Move the commit index forward; it never passes the end of the log.
    pub fn set_commit_index(&mut self, index: LogIndex) -> Result<()> {
        if index < self.commit_index {
            return Err(Error::InvalidArgument(format!(
                "commit index cannot move back from {} to {index}",
                self.commit_index
            )));
        }
        if index > self.last_log_index() {
            return Err(Error::InvalidArgument(format!(
                "commit index {index} is past the last log index {}",
                self.last_log_index()
            )));
        }
        self.commit_index = index;
        Ok(())
    }

    /// Record that entries up to `index` were applied; never passes the
    /// commit index.
    pub fn mark_applied(&mut self, index: LogIndex) -> Result<()> {
        if index < self.last_applied {
            return Err(Error::InvalidArgument(format!(
                "last applied cannot move back from {} to {index}",
                self.last_applied
            )));
        }
        if index > self.commit_index {
            return Err(Error::InvalidArgument(format!(
                "cannot apply {index} before it is committed (commit index {})",
                self.commit_index
            )));
        }
        self.last_applied = index;
        Ok(())
    }

    fn illegal(&self, operation: &'static str) -> Error {
        Error::IllegalTransition {
            from: self.state,
            operation,
        }
    }
}

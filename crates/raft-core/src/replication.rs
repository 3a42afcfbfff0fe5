//! # replication
//!
//! why: a leader needs to know how far each follower's log matches its own
//! relations: owned by node.rs, reset on every transition to leader
//! what: ReplicationProgress, ReplicationTracker

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::log::LogIndex;
use crate::term::NodeId;

/// How far one peer's log is known to match the leader's
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationProgress {
    /// highest index known to be replicated on the peer
    pub match_index: LogIndex,
    /// index of the next entry to send to the peer
    pub next_index: LogIndex,
}

/// Per-peer replication bookkeeping. No I/O.
///
/// `match_index` only moves forward for a given leadership term; the tracker is
/// rebuilt with [`ReplicationTracker::reset`] when a new term of leadership begins.
#[derive(Debug, Clone, Default)]
pub struct ReplicationTracker {
    progress: BTreeMap<NodeId, ReplicationProgress>,
}

impl ReplicationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `peers` from scratch: nothing matched, next entry to send
    /// is the one after the leader's last.
    pub fn reset(&mut self, peers: impl IntoIterator<Item = NodeId>, last_log_index: LogIndex) {
        self.progress = peers
            .into_iter()
            .map(|peer| {
                (
                    peer,
                    ReplicationProgress {
                        match_index: 0,
                        next_index: last_log_index + 1,
                    },
                )
            })
            .collect();
    }

    /// Record that `peer` has replicated everything up to `match_index`.
    pub fn advance(&mut self, peer: NodeId, match_index: LogIndex) -> Result<()> {
        let progress = self
            .progress
            .get_mut(&peer)
            .ok_or_else(|| Error::InvalidArgument(format!("peer {peer} is not tracked")))?;
        if match_index < progress.match_index {
            return Err(Error::InvalidArgument(format!(
                "match index for peer {peer} cannot move back from {} to {match_index}",
                progress.match_index
            )));
        }
        let next_index = match_index.checked_add(1).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "match index {match_index} for peer {peer} leaves no next index"
            ))
        })?;
        progress.match_index = match_index;
        progress.next_index = next_index;
        Ok(())
    }

    pub fn progress_of(&self, peer: NodeId) -> Option<ReplicationProgress> {
        self.progress.get(&peer).copied()
    }

    pub fn peers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.progress.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.progress.is_empty()
    }

    /// Forget all progress, used when stepping down.
    pub fn clear(&mut self) {
        self.progress.clear();
    }
}

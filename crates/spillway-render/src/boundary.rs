//! Boundary manager: the commit units of a session and the policy deciding
//! what happens when a chunk inside one suspends.

use std::collections::BTreeSet;
use std::ops::Index;
use std::time::Duration;

use tokio::time::Instant;

use spillway_core::wire::BoundaryId;

use crate::chunk::ChunkKey;

/// Index of a boundary in its session's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundaryKey(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryStatus {
    Pending,
    Committed,
    /// Dropped without committing: its subtree was discarded, or a
    /// superseding boundary committed first.
    Abandoned,
}

#[derive(Debug)]
pub struct Boundary {
    /// Wire id of the marker region. Shared by a boundary and the boundary
    /// that supersedes it.
    pub id: BoundaryId,
    pub started_at: Instant,
    pub root: ChunkKey,
    pub supersedes: Option<BoundaryKey>,
    pub status: BoundaryStatus,
}

/// What to do with a chunk that reported a pending value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    /// Suspend. Retry when the value resolves or, if set, when the deadline
    /// passes, whichever comes first.
    Wait { deadline: Option<Duration> },
    /// Budget spent: show the fallback of this timeout marker.
    Fallback(ChunkKey),
    /// Budget spent and nothing to fall back to.
    Missing,
}

pub struct BoundaryManager {
    boundaries: Vec<Boundary>,
    pending: BTreeSet<BoundaryKey>,
    default_timeout: Duration,
}

impl BoundaryManager {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            boundaries: Vec::new(),
            pending: BTreeSet::new(),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Open a boundary rooted at `root` and add it to the pending set.
    pub fn open(&mut self, id: BoundaryId, root: ChunkKey, started_at: Instant) -> BoundaryKey {
        self.insert(Boundary {
            id,
            started_at,
            root,
            supersedes: None,
            status: BoundaryStatus::Pending,
        })
    }

    /// Open a boundary that re-renders `previous`'s region with real content
    /// while `previous` shows the fallback. It keeps `previous`'s wire id and
    /// start time.
    pub fn open_resumed(&mut self, previous: BoundaryKey, root: ChunkKey) -> BoundaryKey {
        let Boundary { id, started_at, .. } = self[previous];
        self.insert(Boundary {
            id,
            started_at,
            root,
            supersedes: Some(previous),
            status: BoundaryStatus::Pending,
        })
    }

    fn insert(&mut self, boundary: Boundary) -> BoundaryKey {
        self.boundaries.push(boundary);
        let key = BoundaryKey(self.boundaries.len() - 1);
        self.pending.insert(key);
        key
    }

    pub fn is_pending(&self, key: BoundaryKey) -> bool {
        self.pending.contains(&key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// True once every boundary has committed or been abandoned.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    /// Mark `key` committed. A boundary it supersedes that is still pending
    /// is abandoned: its fallback is no longer needed.
    pub fn commit(&mut self, key: BoundaryKey) {
        self.settle(key, BoundaryStatus::Committed);
        if let Some(previous) = self.boundaries[key.0].supersedes {
            self.abandon(previous);
        }
    }

    pub fn abandon(&mut self, key: BoundaryKey) {
        self.settle(key, BoundaryStatus::Abandoned);
    }

    fn settle(&mut self, key: BoundaryKey, status: BoundaryStatus) {
        if self.pending.remove(&key) {
            self.boundaries[key.0].status = status;
        }
    }

    /// Decide the fate of a suspension `elapsed` into its boundary's
    /// lifetime.
    ///
    /// `marker` is the nearest enclosing timeout marker and `expired` whether
    /// it already shows its fallback.
    pub fn intercept(
        &self,
        elapsed: Duration,
        budget: Option<Duration>,
        marker: Option<ChunkKey>,
        expired: bool,
    ) -> Interception {
        if expired {
            return Interception::Wait { deadline: None };
        }
        let budget = budget.unwrap_or(self.default_timeout);
        if elapsed < budget {
            return Interception::Wait {
                deadline: Some(budget - elapsed),
            };
        }
        match marker {
            Some(marker) => Interception::Fallback(marker),
            None => Interception::Missing,
        }
    }
}

impl Index<BoundaryKey> for BoundaryManager {
    type Output = Boundary;

    fn index(&self, key: BoundaryKey) -> &Boundary {
        &self.boundaries[key.0]
    }
}

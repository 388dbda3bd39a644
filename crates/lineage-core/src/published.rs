//! Published snapshot cell and rebuild ordering
//!
//! A rebuild assembles a complete [`PublishedState`] off to the side and
//! swaps one `Arc` in. Readers clone the `Arc` under a read lock held only
//! for the clone, so a running rebuild never blocks them.

use lineage_criticality::{Classification, HintRegistry};
use lineage_graph::{BuildReport, BuildWarning, GraphSnapshot};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Everything a query reads, from one build
#[derive(Debug, Clone)]
pub struct PublishedState {
    /// Snapshot with derived tiers stamped on its nodes
    pub graph: GraphSnapshot,
    /// Derived tiers with their evidence
    pub classification: Classification,
    /// Hint registry published with the graph
    pub hints: HintRegistry,
    /// Non-fatal build findings
    pub warnings: Vec<BuildWarning>,
    /// Build statistics; `None` before the first build
    pub report: Option<BuildReport>,
}

impl PublishedState {
    /// State before any build: version 0, no nodes, no hints
    #[must_use]
    pub fn empty() -> Self {
        Self {
            graph: GraphSnapshot::empty(),
            classification: Classification::default(),
            hints: HintRegistry::new(),
            warnings: Vec::new(),
            report: None,
        }
    }

    /// Snapshot version
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.graph.version()
    }
}

/// Atomically replaceable `Arc<PublishedState>`
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<Arc<PublishedState>>,
}

impl SnapshotCell {
    /// Cell holding the empty state
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(PublishedState::empty())),
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn load(&self) -> Arc<PublishedState> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current state
    pub fn publish(&self, next: Arc<PublishedState>) {
        *self.current.write() = next;
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct QueueState {
    serving: u64,
    abandoned: BTreeSet<u64>,
}

impl QueueState {
    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

/// Ticket queue running rebuilds one at a time in submission order
#[derive(Debug, Default)]
pub(crate) struct RebuildQueue {
    next: AtomicU64,
    state: Mutex<QueueState>,
    turn: Condvar,
}

impl RebuildQueue {
    pub(crate) fn ticket(self: &Arc<Self>) -> RebuildTicket {
        RebuildTicket {
            queue: Arc::clone(self),
            number: self.next.fetch_add(1, Ordering::SeqCst),
            served: false,
        }
    }
}

/// Place in the rebuild queue
#[derive(Debug)]
pub(crate) struct RebuildTicket {
    queue: Arc<RebuildQueue>,
    number: u64,
    served: bool,
}

impl RebuildTicket {
    /// Block until every earlier ticket has run or been dropped
    pub(crate) fn wait(mut self) -> RebuildTurn {
        {
            let mut state = self.queue.state.lock();
            while state.serving != self.number {
                self.queue.turn.wait(&mut state);
            }
        }
        self.served = true;
        RebuildTurn {
            queue: Arc::clone(&self.queue),
        }
    }

    #[cfg(test)]
    pub(crate) fn number(&self) -> u64 {
        self.number
    }
}

impl Drop for RebuildTicket {
    fn drop(&mut self) {
        if self.served {
            return;
        }
        let mut state = self.queue.state.lock();
        if state.serving == self.number {
            state.advance();
        } else {
            state.abandoned.insert(self.number);
        }
        drop(state);
        self.queue.turn.notify_all();
    }
}

/// Exclusive rebuild slot; the next ticket runs when this drops
#[derive(Debug)]
pub(crate) struct RebuildTurn {
    queue: Arc<RebuildQueue>,
}

impl Drop for RebuildTurn {
    fn drop(&mut self) {
        self.queue.state.lock().advance();
        self.queue.turn.notify_all();
    }
}

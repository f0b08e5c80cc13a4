//! Published routing view shared with the data plane

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::member::MemberId;
use crate::topology::RoutingSnapshot;

/// Receiver notified whenever the published topology changes
pub type SnapshotSubscription = watch::Receiver<Arc<RoutingSnapshot>>;

/// Holds the most recently published snapshot.
///
/// Readers never block and always observe a complete snapshot; writers swap a
/// fully built snapshot in with a single pointer store.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<RoutingSnapshot>,
    changes: watch::Sender<Arc<RoutingSnapshot>>,
}

impl SnapshotStore {
    /// Create a store holding an empty, unavailable snapshot
    pub fn new(metadata_servers: Vec<MemberId>) -> Self {
        Self::with_snapshot(RoutingSnapshot::initial(metadata_servers))
    }

    /// Create a store holding the given snapshot
    pub fn with_snapshot(snapshot: RoutingSnapshot) -> Self {
        let snapshot = Arc::new(snapshot);
        let (changes, _) = watch::channel(Arc::clone(&snapshot));

        Self {
            current: ArcSwap::new(snapshot),
            changes,
        }
    }

    /// The most recently published snapshot
    pub fn current(&self) -> Arc<RoutingSnapshot> {
        self.current.load_full()
    }

    /// Swap in a new snapshot, returning whether its members differ from the previous one.
    ///
    /// Subscribers are only woken when the members changed.
    pub fn publish(&self, snapshot: RoutingSnapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        let previous = self.current.swap(Arc::clone(&snapshot));
        let changed = *previous != *snapshot;

        if changed {
            self.changes.send_replace(snapshot);
        }

        changed
    }

    /// Subscribe to topology changes
    pub fn subscribe(&self) -> SnapshotSubscription {
        self.changes.subscribe()
    }
}

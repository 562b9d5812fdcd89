//! A versioned snapshot of service discovery data.
//!
//! The backend watch (outside of this crate) publishes complete snapshots
//! into a [`SnapshotStore`]. Readers load the current snapshot without
//! locking and keep using it for as long as they hold the [`Arc`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use crate::base::Serial;

use super::services::Snapshot;

//------------ SnapshotStore -------------------------------------------------

/// The latest known state of the service discovery backend.
#[derive(Debug)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    synced: AtomicBool,
}

impl SnapshotStore {
    /// Creates an empty store that hasn't synced yet.
    pub fn new() -> Self {
        SnapshotStore {
            current: ArcSwap::from_pointee(Snapshot::default()),
            synced: AtomicBool::new(false),
        }
    }

    /// Creates a store that is already synced to `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        store.publish(snapshot);
        store
    }

    /// Makes `snapshot` the current state.
    ///
    /// A version that moves backwards is accepted, the backend is the
    /// authority on its own data. Secondaries will see a serial that isn't
    /// newer than theirs and resync fully.
    pub fn publish(&self, snapshot: Snapshot) {
        let old = self.current.load().version();
        let new = snapshot.version();
        if new.partial_cmp(&old) == Some(core::cmp::Ordering::Less) {
            warn!("Backend version went backwards from {old} to {new}");
        }
        debug!(
            "Publishing backend snapshot version {new} with {} services",
            snapshot.services().len()
        );
        self.current.store(Arc::new(snapshot));
        self.synced.store(true, Ordering::Release);
    }

    /// Returns the current snapshot.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Returns the version of the current snapshot.
    pub fn version(&self) -> Serial {
        self.current.load().version()
    }

    /// Returns whether at least one snapshot has been published.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn publish_replaces_snapshot() {
        let store = SnapshotStore::new();
        assert!(!store.is_synced());
        assert_eq!(store.version(), Serial(0));

        let old = store.load();
        store.publish(Snapshot::new(Serial(7)));
        assert!(store.is_synced());
        assert_eq!(store.version(), Serial(7));

        // Earlier readers keep their view.
        assert_eq!(old.version(), Serial(0));
    }
}

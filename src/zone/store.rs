use super::ZoneSnapshot;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Holder of the currently served zone snapshot.
///
/// Readers take a cheap `Arc` clone under a short read lock and keep a
/// consistent view for as long as they hold it; `replace` swaps the pointer
/// under the write lock, so no reader can see a half-installed zone.
#[derive(Debug, Default)]
pub struct RecordStore {
    current: RwLock<Arc<ZoneSnapshot>>,
    /// Modification time of the zone source when it was last loaded
    last_modified: Mutex<Option<SystemTime>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently active snapshot
    pub fn snapshot(&self) -> Arc<ZoneSnapshot> {
        self.current.read().clone()
    }

    /// Atomically install a new snapshot
    pub fn replace(&self, snapshot: ZoneSnapshot) {
        let snapshot = Arc::new(snapshot);
        debug!("Installing zone snapshot with {} records", snapshot.len());
        *self.current.write() = snapshot;
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        *self.last_modified.lock()
    }

    pub fn set_last_modified(&self, modified: Option<SystemTime>) {
        *self.last_modified.lock() = modified;
    }
}

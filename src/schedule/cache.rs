//! In-memory schedule map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::ScheduleEntry;

/// Thread-safe `buscode → ScheduleEntry` lookup.
///
/// The refresher task is the only writer; every other component holds a
/// cloned read handle. Readers always observe a complete map; replacement
/// happens wholesale under the write lock.
#[derive(Clone, Default)]
pub struct ScheduleCache {
    inner: Arc<RwLock<HashMap<String, ScheduleEntry>>>,
}

impl ScheduleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the schedule entry for a buscode.
    pub async fn get(&self, buscode: &str) -> Option<ScheduleEntry> {
        let guard = self.inner.read().await;
        guard.get(buscode).cloned()
    }

    /// Replace the whole map.
    ///
    /// An empty map is a no-op: a failed refresh must not wipe the
    /// last-known-good schedule.
    pub async fn load(&self, map: HashMap<String, ScheduleEntry>) {
        if map.is_empty() {
            return;
        }

        let mut guard = self.inner.write().await;
        *guard = map;
    }

    /// Number of scheduled buscodes currently known.
    pub async fn len(&self) -> usize {
        let guard = self.inner.read().await;
        guard.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

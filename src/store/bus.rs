//! Persistent per-destination state store.
//!
//! The map survives restarts through a single binary snapshot file: loaded
//! at startup (absence is not fatal), rewritten periodically and once at
//! shutdown. Snapshots go to a temporary sibling first and are renamed into
//! place so a crash mid-write cannot lose the previous copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::BusState;

use super::error::StoreError;

/// Default snapshot file, relative to the working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "bus_cache.bin";

/// Thread-safe `buscode → BusState` store with snapshot persistence.
///
/// Records are created on first observation and never deleted. State swaps
/// run through [`BusStateStore::with_map`] so previous-state capture and
/// mutation stay indivisible.
#[derive(Debug, Clone)]
pub struct BusStateStore {
    inner: Arc<RwLock<HashMap<String, BusState>>>,
    path: Arc<PathBuf>,
}

impl BusStateStore {
    /// Open the store, loading the snapshot at `path` when one exists.
    ///
    /// A missing file starts an empty store; an unreadable one is logged
    /// and ignored (snapshot compatibility across versions is not
    /// guaranteed).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = match load_snapshot(&path) {
            Ok(Some(map)) => {
                info!(path = %path.display(), entries = map.len(), "loaded bus-state snapshot");
                map
            }
            Ok(None) => HashMap::new(),
            Err(err) => {
                warn!(path = %path.display(), "ignoring unreadable bus-state snapshot: {err}");
                HashMap::new()
            }
        };

        Self {
            inner: Arc::new(RwLock::new(map)),
            path: Arc::new(path),
        }
    }

    /// An empty store with the default path (tests, dry runs).
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            path: Arc::new(PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
        }
    }

    /// Read one destination's record.
    pub async fn get(&self, buscode: &str) -> Option<BusState> {
        let guard = self.inner.read().await;
        guard.get(buscode).cloned()
    }

    /// Run a closure with exclusive access to the whole map.
    ///
    /// This is the only mutation path; callers must not perform I/O inside
    /// the closure.
    pub async fn with_map<R>(&self, f: impl FnOnce(&mut HashMap<String, BusState>) -> R) -> R {
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }

    pub async fn len(&self) -> usize {
        let guard = self.inner.read().await;
        guard.len()
    }

    /// Write the snapshot file.
    ///
    /// Serializes against a consistent view under the read lock, then
    /// writes a temporary file and renames it over the target.
    pub async fn snapshot(&self) -> Result<(), StoreError> {
        let bytes = {
            let guard = self.inner.read().await;
            bincode::serialize(&*guard)?
        };

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, self.path.as_ref())?;

        Ok(())
    }

    /// The snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_snapshot(path: &Path) -> Result<Option<HashMap<String, BusState>>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    let bytes = std::fs::read(path)?;
    let map = bincode::deserialize(&bytes)?;

    Ok(Some(map))
}

//! Fleet-health counters per tag.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::Counters;

/// Thread-safe per-tag classification tallies.
///
/// Full polls replace a tag's tally wholesale (the authoritative view);
/// push notifications merge additively, including the negative decrements
/// produced by the correlator's optimistic updates. The merged view may be
/// transiently negative between polls; that is by contract and must not be
/// clamped.
#[derive(Debug, Clone, Default)]
pub struct CountersStore {
    inner: Arc<RwLock<HashMap<String, Counters>>>,
}

impl CountersStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authoritative replacement after a full poll batch.
    pub async fn replace(&self, tag: &str, counters: Counters) {
        let mut guard = self.inner.write().await;
        guard.insert(tag.to_string(), counters);
    }

    /// Additive merge after a push-notification batch.
    pub async fn merge(&self, tag: &str, counters: Counters) {
        let mut guard = self.inner.write().await;
        guard.entry(tag.to_string()).or_default().merge(&counters);
    }

    /// Current tally for a tag (zeroes when the tag is unseen).
    pub async fn get(&self, tag: &str) -> Counters {
        let guard = self.inner.read().await;
        guard.get(tag).copied().unwrap_or_default()
    }

    /// Run a closure with exclusive access to the whole map.
    pub async fn with_map<R>(&self, f: impl FnOnce(&mut HashMap<String, Counters>) -> R) -> R {
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }
}

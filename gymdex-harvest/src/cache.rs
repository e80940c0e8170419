//! Bounded observation cache
//!
//! One cache instance is owned by the orchestrator and shared (behind a
//! mutex) with the cached-result fallback strategy. Capacity-capped with LRU
//! eviction; keys are normalized so spacing and casing differences hit the
//! same entry.

use gymdex_common::records::{facility_key, Observation};
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

/// Capacity-bounded cache of merged observations keyed by normalized target
pub struct ObservationCache {
    inner: Mutex<LruCache<String, Observation>>,
}

impl ObservationCache {
    /// Create a cache holding at most `capacity` observations
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn key(name: &str, address: Option<&str>) -> String {
        facility_key(name, address.unwrap_or(""))
    }

    /// Look up a previously merged observation
    pub async fn get(&self, name: &str, address: Option<&str>) -> Option<Observation> {
        let mut cache = self.inner.lock().await;
        cache.get(&Self::key(name, address)).cloned()
    }

    /// Store a merged observation, evicting the least recently used entry
    /// when full
    pub async fn put(&self, name: &str, address: Option<&str>, observation: Observation) {
        let mut cache = self.inner.lock().await;
        cache.put(Self::key(name, address), observation);
    }

    /// Number of cached observations
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

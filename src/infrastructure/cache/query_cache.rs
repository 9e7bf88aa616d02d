//! In-memory LRU cache for query results.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::domain::ports::QueryCachePort;

/// Default maximum number of cached query results.
pub const DEFAULT_CAPACITY: usize = 128;

/// LRU cache for deserialized query results, keyed by logical resource.
pub struct QueryCache {
    entries: Mutex<LruCache<String, Value>>,
}

impl QueryCache {
    /// Creates a cache with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Looks up a cached result, promoting it.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Stores a result.
    pub fn put(&self, key: &str, value: Value) {
        self.entries.lock().put(key.to_string(), value);
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl QueryCachePort for QueryCache {
    fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        if !stale.is_empty() {
            debug!(prefix = %prefix, invalidated = stale.len(), "Invalidated query results");
        }
    }

    fn clear(&self) {
        self.entries.lock().clear();
        debug!("Cleared query cache");
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

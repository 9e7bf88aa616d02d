//! In-memory partitioned response cache.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::domain::entities::CachedResponse;
use crate::domain::errors::CacheResult;
use crate::domain::ports::CacheStorePort;

/// In-memory named caches keyed by request URL.
/// Thread-safe and optimized for frequent reads.
pub struct MemoryCacheStore {
    caches: RwLock<HashMap<String, HashMap<String, CachedResponse>>>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Returns hit/miss statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub async fn stats(&self) -> CacheStats {
        let hits = self.hits.load(std::sync::atomic::Ordering::Relaxed);
        let misses = self.misses.load(std::sync::atomic::Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let entries = self.caches.read().await.values().map(HashMap::len).sum();
        CacheStats {
            hits,
            misses,
            hit_rate,
            entries,
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about store performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of entries across all caches.
    pub entries: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries, {:.1}% hit rate ({} hits, {} misses)",
            self.entries, self.hit_rate, self.hits, self.misses
        )
    }
}

#[async_trait]
impl CacheStorePort for MemoryCacheStore {
    async fn cache_names(&self) -> Vec<String> {
        self.caches.read().await.keys().cloned().collect()
    }

    async fn entry_urls(&self, cache: &str) -> Vec<String> {
        self.caches
            .read()
            .await
            .get(cache)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn get(&self, cache: &str, url: &str) -> Option<CachedResponse> {
        let caches = self.caches.read().await;
        let found = caches.get(cache).and_then(|entries| entries.get(url));
        if let Some(entry) = found {
            self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            trace!(cache = %cache, url = %url, "Memory store hit");
            Some(entry.clone())
        } else {
            self.misses
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            trace!(cache = %cache, url = %url, "Memory store miss");
            None
        }
    }

    async fn put(&self, cache: &str, url: &str, response: CachedResponse) -> CacheResult<()> {
        let mut caches = self.caches.write().await;
        caches
            .entry(cache.to_string())
            .or_default()
            .insert(url.to_string(), response);
        debug!(cache = %cache, url = %url, "Stored response");
        Ok(())
    }

    async fn delete_entry(&self, cache: &str, url: &str) -> CacheResult<bool> {
        let mut caches = self.caches.write().await;
        let existed = caches
            .get_mut(cache)
            .is_some_and(|entries| entries.remove(url).is_some());
        if existed {
            debug!(cache = %cache, url = %url, "Deleted entry");
        }
        Ok(existed)
    }

    async fn delete_cache(&self, name: &str) -> CacheResult<bool> {
        let mut caches = self.caches.write().await;
        let existed = caches.remove(name).is_some();
        if existed {
            debug!(cache = %name, "Deleted cache");
        }
        Ok(existed)
    }

    async fn clear_all(&self) {
        self.caches.write().await.clear();
        debug!("Cleared all caches");
    }
}

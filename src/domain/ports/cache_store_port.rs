//! Ports for the ambient cache and key-value storage layers.

use async_trait::async_trait;

use crate::domain::entities::CachedResponse;
use crate::domain::errors::CacheResult;

/// Port over the partitioned response cache (the Cache Storage analog).
///
/// Entries are keyed by request URL and grouped into named caches.
/// Implementations must be thread-safe; every operation is idempotent so
/// concurrent purges degrade to redundant work, never corruption.
#[async_trait]
pub trait CacheStorePort: Send + Sync {
    /// Names of all existing caches.
    async fn cache_names(&self) -> Vec<String>;

    /// URLs of every entry stored in the named cache.
    async fn entry_urls(&self, cache: &str) -> Vec<String>;

    /// Looks up an entry.
    async fn get(&self, cache: &str, url: &str) -> Option<CachedResponse>;

    /// Stores an entry, creating the named cache if needed.
    ///
    /// # Errors
    /// Returns an error if the underlying store rejects the write.
    async fn put(&self, cache: &str, url: &str, response: CachedResponse) -> CacheResult<()>;

    /// Deletes one entry. Returns true if it existed.
    ///
    /// # Errors
    /// Returns an error if the underlying store fails; deleting a missing
    /// entry is a no-op, not an error.
    async fn delete_entry(&self, cache: &str, url: &str) -> CacheResult<bool>;

    /// Deletes an entire named cache. Returns true if it existed.
    ///
    /// # Errors
    /// Returns an error if the underlying store fails.
    async fn delete_cache(&self, name: &str) -> CacheResult<bool>;

    /// Deletes every cache and every entry.
    async fn clear_all(&self);
}

/// Port over string key-value storage (the localStorage analog).
///
/// Used for feature-flag persistence, the private-mode probe, and the
/// nuclear clear of cache-related keys.
pub trait KeyValueStorePort: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a value.
    ///
    /// # Errors
    /// Returns an error when the store refuses writes, which the private-mode
    /// probe treats as "private browsing".
    fn set(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Removes a key.
    fn remove(&self, key: &str);

    /// All stored keys.
    fn keys(&self) -> Vec<String>;

    /// Removes everything.
    fn clear(&self);
}

/// Port over the in-memory query cache layer.
pub trait QueryCachePort: Send + Sync {
    /// Drops every cached query result whose key starts with the prefix.
    fn invalidate_prefix(&self, prefix: &str);

    /// Drops every cached query result.
    fn clear(&self);

    /// Number of cached results.
    fn len(&self) -> usize;

    /// Returns true when nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

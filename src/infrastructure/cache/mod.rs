//! Cache store adapters.

mod disk_store;
mod memory_store;
mod query_cache;

pub use disk_store::DiskCacheStore;
pub use memory_store::{CacheStats, MemoryCacheStore};
pub use query_cache::QueryCache;

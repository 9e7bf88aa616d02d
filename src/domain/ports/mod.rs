//! Port definitions for external capabilities.

mod cache_store_port;
mod notification_port;
mod render_port;
mod worker_port;

pub use cache_store_port::{CacheStorePort, KeyValueStorePort, QueryCachePort};
pub use notification_port::NotificationPort;
pub use render_port::RenderSurfacePort;
pub use worker_port::WorkerControlPort;

#[cfg(test)]
pub mod mocks {
    pub use super::cache_store_port::mock::MockKeyValueStore;
    pub use super::notification_port::mock::MockNotificationPort;
    pub use super::render_port::mock::MockRenderSurface;
}

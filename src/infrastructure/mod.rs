//! Infrastructure layer with external service adapters.

/// Cache store adapters.
pub mod cache;
/// Application configuration.
pub mod config;
/// Realtime change feed.
pub mod feed;
/// Fetch coordination.
pub mod fetch;
/// System notifications.
pub mod notifications;
/// Key-value storage adapters.
pub mod storage;
/// Rendering surface adapter.
pub mod surface;
/// Background cache worker.
pub mod worker;

pub use cache::{CacheStats, DiskCacheStore, MemoryCacheStore, QueryCache};
pub use config::{AppConfig, CliArgs, FlagsStore, LogLevel, StorageManager};
pub use feed::{FeedClient, FeedClientConfig, FeedEvent, WebSocketFeedConnection};
pub use fetch::FetchCoordinator;
pub use notifications::DesktopNotificationService;
pub use storage::{FileKeyValueStore, MemoryKeyValueStore};
pub use surface::LogRenderSurface;
pub use worker::{WorkerHandle, detect_private_mode};

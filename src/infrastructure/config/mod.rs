//! Application configuration.

pub mod app_config;
pub mod args;
pub mod flags;
pub mod storage;

pub use app_config::{AppConfig, CacheConfig, FeedConfig, LogLevel, ResolverConfig};
pub use args::CliArgs;
pub use flags::FlagsStore;
pub use storage::{ConfigError, StorageManager};

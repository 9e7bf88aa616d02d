//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::entities::{FeatureFlags, SourceKind, TableName};

const APP_NAME: &str = "pixelsync";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "tecknian";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration from file and CLI.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Enable desktop notifications for content updates.
    #[serde(default = "default_true")]
    pub enable_desktop_notifications: bool,

    /// Site origin (scheme and host) resolved against relative asset
    /// paths. Install pre-caching needs it; absolute URLs work without it.
    #[serde(default)]
    pub origin: Option<String>,

    /// Change-feed configuration.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Image-resolution configuration.
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// Change-feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Websocket endpoint. The feed stays off when unset.
    #[serde(default)]
    pub url: Option<String>,

    /// Tables to watch. Empty means all watched tables.
    #[serde(default)]
    pub tables: Vec<TableName>,

    /// Seconds between heartbeat pushes.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Reconnect automatically after recoverable failures.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Reconnect attempts before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl FeedConfig {
    /// Heartbeat interval as a duration.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// The tables to subscribe to, defaulting to every watched table.
    #[must_use]
    pub fn effective_tables(&self) -> Vec<TableName> {
        if self.tables.is_empty() {
            TableName::ALL.to_vec()
        } else {
            self.tables.clone()
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            tables: Vec::new(),
            heartbeat_secs: default_heartbeat_secs(),
            auto_reconnect: true,
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum size of the on-disk cache in bytes.
    #[serde(default = "default_max_disk_bytes")]
    pub max_disk_bytes: u64,

    /// Capacity of the in-memory query cache.
    #[serde(default = "default_query_capacity")]
    pub query_capacity: usize,

    /// On-disk cache directory. Platform data dir when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_disk_bytes: default_max_disk_bytes(),
            query_capacity: default_query_capacity(),
            dir: None,
        }
    }
}

/// Image-resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Prefer locally mirrored images over external URLs.
    #[serde(default = "default_true")]
    pub prefer_local_images: bool,

    /// Route external images through the image proxy.
    #[serde(default)]
    pub enable_image_proxy: bool,

    /// Automatically swap in fallbacks when an image fails to load.
    #[serde(default = "default_true")]
    pub auto_fix_images: bool,

    /// Candidate order. Missing kinds are appended in default order.
    #[serde(default = "default_priority")]
    pub priority: Vec<SourceKind>,
}

impl ResolverConfig {
    /// Feature flags derived from this configuration.
    #[must_use]
    pub const fn flags(&self) -> FeatureFlags {
        FeatureFlags {
            prefer_local_images: self.prefer_local_images,
            enable_image_proxy: self.enable_image_proxy,
            auto_fix_images: self.auto_fix_images,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            prefer_local_images: true,
            enable_image_proxy: false,
            auto_fix_images: true,
            priority: default_priority(),
        }
    }
}

fn default_priority() -> Vec<SourceKind> {
    vec![SourceKind::Local, SourceKind::External, SourceKind::Placeholder]
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_max_disk_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_query_capacity() -> usize {
    128
}

fn default_true() -> bool {
    true
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: CliArgs) {
        if let Some(config_path) = args.config {
            self.config = Some(config_path);
        }
        if let Some(log_path) = args.log_path {
            self.log_path = Some(log_path);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(notifications) = args.enable_desktop_notifications {
            self.enable_desktop_notifications = notifications;
        }
        if let Some(origin) = args.origin {
            self.origin = Some(origin);
        }
        if let Some(feed_url) = args.feed_url {
            self.feed.url = Some(feed_url);
        }
        if let Some(auto_reconnect) = args.auto_reconnect {
            self.feed.auto_reconnect = auto_reconnect;
        }
        if let Some(cache_dir) = args.cache_dir {
            self.cache.dir = Some(cache_dir);
        }
        if let Some(prefer_local) = args.prefer_local_images {
            self.resolver.prefer_local_images = prefer_local;
        }
        if let Some(auto_fix) = args.auto_fix_images {
            self.resolver.auto_fix_images = auto_fix;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("pixelsync.log"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            enable_desktop_notifications: true,
            origin: None,
            feed: FeedConfig::default(),
            cache: CacheConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

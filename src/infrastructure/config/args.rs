use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "pixelsync",
    version,
    about = "Client-side image resolution, caching and synchronization engine",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable desktop notifications for content updates.
    #[arg(long)]
    pub enable_desktop_notifications: Option<bool>,

    /// Site origin the worker resolves relative asset paths against.
    #[arg(long, env = "PIXELSYNC_ORIGIN", value_name = "URL")]
    pub origin: Option<String>,

    /// Websocket endpoint of the change feed.
    #[arg(long, env = "PIXELSYNC_FEED_URL", value_name = "URL")]
    pub feed_url: Option<String>,

    /// Reconnect automatically after recoverable feed failures.
    #[arg(long)]
    pub auto_reconnect: Option<bool>,

    /// On-disk cache directory.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Prefer locally mirrored images over external URLs.
    #[arg(long)]
    pub prefer_local_images: Option<bool>,

    /// Automatically swap in fallbacks when an image fails to load.
    #[arg(long)]
    pub auto_fix_images: Option<bool>,
}

//! Cached responses and cache-name generation handling.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Fetched from the network.
    Network,
    /// Served from a named cache.
    Cache,
    /// Synthesized offline fallback.
    Offline,
    /// Passed through untouched (never-cache path).
    Passthrough,
}

/// A response body stored in a named cache, keyed by request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content type, when the origin supplied one.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Bytes,
    /// When the entry was stored.
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Creates a fresh entry stamped with the current time.
    #[must_use]
    pub fn new(status: u16, content_type: Option<String>, body: Bytes) -> Self {
        Self {
            status,
            content_type,
            body,
            stored_at: Utc::now(),
        }
    }

    /// Returns true for a cacheable success response.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Build-generation token suffixing every cache name.
///
/// A deployed build only reads and writes caches of its own generation;
/// anything else is deleted on activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheGeneration(String);

const STATIC_PREFIX: &str = "pixelsync-static-";
const RUNTIME_PREFIX: &str = "pixelsync-runtime-";

impl CacheGeneration {
    /// Creates a generation from a build/version token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generation for the current crate version.
    #[must_use]
    pub fn current() -> Self {
        Self::new(crate::VERSION)
    }

    /// The raw token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Name of the static-asset cache for this generation.
    #[must_use]
    pub fn static_cache(&self) -> String {
        format!("{STATIC_PREFIX}{}", self.0)
    }

    /// Name of the runtime (document) cache for this generation.
    #[must_use]
    pub fn runtime_cache(&self) -> String {
        format!("{RUNTIME_PREFIX}{}", self.0)
    }

    /// All cache names this generation owns.
    #[must_use]
    pub fn cache_names(&self) -> Vec<String> {
        vec![self.static_cache(), self.runtime_cache()]
    }

    /// Returns true if the named cache belongs to this generation.
    #[must_use]
    pub fn owns(&self, cache_name: &str) -> bool {
        cache_name == self.static_cache() || cache_name == self.runtime_cache()
    }
}

impl std::fmt::Display for CacheGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

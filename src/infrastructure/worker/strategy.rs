//! Fetch strategy rules: never-cache list, partitioning, offline fallback.

use bytes::Bytes;

use crate::domain::entities::{CacheGeneration, CachedResponse};

use super::protocol::RequestDestination;

/// Path prefixes that must never be cached or answered from cache.
/// Admin, auth and API endpoints would otherwise go stale or leak.
pub const NEVER_CACHE_PREFIXES: [&str; 5] = ["/admin", "/auth", "/api/", "/supabase", "/_vercel"];

/// URL schemes passed through untouched.
pub const NEVER_CACHE_SCHEMES: [&str; 2] = ["chrome-extension://", "moz-extension://"];

/// Body of the synthesized offline navigation response.
pub const OFFLINE_BODY: &str = "Offline: this page is not available without a connection.";

/// Minimal asset list pre-cached at install.
pub const PRECACHE_ASSETS: [&str; 2] = ["/", "/manifest.json"];

/// Returns true when the URL must bypass the cache entirely.
#[must_use]
pub fn should_bypass(url: &str) -> bool {
    if NEVER_CACHE_SCHEMES.iter().any(|s| url.starts_with(s)) {
        return true;
    }
    let path = url
        .split_once("://")
        .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    if path.ends_with(".map") {
        return true;
    }
    NEVER_CACHE_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Picks the cache partition for a request destination: documents go to the
/// runtime cache, everything else to the static cache.
#[must_use]
pub fn cache_partition(generation: &CacheGeneration, destination: RequestDestination) -> String {
    match destination {
        RequestDestination::Document => generation.runtime_cache(),
        _ => generation.static_cache(),
    }
}

/// Synthesizes the 503 response served to offline navigations.
#[must_use]
pub fn offline_response() -> CachedResponse {
    CachedResponse::new(
        503,
        Some("text/plain".to_string()),
        Bytes::from_static(OFFLINE_BODY.as_bytes()),
    )
}

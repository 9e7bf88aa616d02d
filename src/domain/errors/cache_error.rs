//! Errors raised by cache stores and the worker.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache and worker operations.
///
/// Every variant is recoverable at the purge/refresh boundary: callers log
/// and continue, a single failed operation never aborts the remainder.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Entry or cache not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A cache store API call failed.
    #[error("store error: {0}")]
    StoreError(String),
    /// I/O error during a disk cache operation.
    #[error("io error: {0}")]
    IoError(String),
    /// Network error while fetching a resource.
    #[error("network error: {0}")]
    NetworkError(String),
    /// Private browsing mode disables all caching.
    #[error("private mode detected, caching disabled")]
    PrivateMode,
    /// Offline and no cache entry for a non-navigation request.
    #[error("offline: no cached entry for {0}")]
    Offline(String),
    /// An invalid purge pattern could not be compiled.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    /// The fetch was superseded by a newer request for the same resource.
    #[error("fetch superseded for {0}")]
    Superseded(String),
    /// The worker command channel is gone.
    #[error("worker channel closed")]
    WorkerGone,
}

impl CacheError {
    /// Constructor for store failures.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreError(message.into())
    }

    /// Constructor for I/O failures.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::IoError(message.into())
    }

    /// Constructor for network failures.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError(message.into())
    }

    /// True when a cache fallback should be attempted after this error.
    #[must_use]
    pub const fn should_try_cache(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::Offline(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_fall_back_to_cache() {
        assert!(CacheError::network("timed out").should_try_cache());
        assert!(!CacheError::PrivateMode.should_try_cache());
        assert!(!CacheError::WorkerGone.should_try_cache());
    }
}

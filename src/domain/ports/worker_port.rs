//! Port for driving the cache worker lifecycle from the main context.

use async_trait::async_trait;

use crate::domain::errors::CacheResult;

/// Port for driving the background cache worker.
///
/// The worker runs in its own execution context; these calls cross the
/// asynchronous, unordered message boundary between the two.
#[async_trait]
pub trait WorkerControlPort: Send + Sync {
    /// Checks for a new worker generation and installs it. Resolves only
    /// after the worker has processed the check, so a subsequent
    /// [`has_waiting`](Self::has_waiting) observes its result.
    ///
    /// # Errors
    /// Returns an error if the worker is gone.
    async fn update(&self) -> CacheResult<()>;

    /// Tells a waiting worker to activate immediately.
    ///
    /// # Errors
    /// Returns an error if the worker is gone.
    async fn skip_waiting(&self) -> CacheResult<()>;

    /// Tells the worker to delete every cache it owns.
    ///
    /// # Errors
    /// Returns an error if the worker is gone.
    async fn clear_cache(&self) -> CacheResult<()>;

    /// Returns true when an installed worker is waiting to activate.
    async fn has_waiting(&self) -> bool;
}

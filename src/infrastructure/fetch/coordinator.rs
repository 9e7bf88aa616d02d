//! Per-resource fetch coordination.
//!
//! Each logical resource (an image slot, a data query) has at most one
//! fetch in flight. Starting a new fetch for the same key aborts the
//! previous one, so stale responses never land after fresher ones.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable};
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::domain::errors::{CacheError, CacheResult};

use crate::infrastructure::worker::{FetchOutcome, FetchRequest, WorkerHandle};

/// Maximum concurrent fetches through the coordinator.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;

/// Routes fetches through the cache worker, one in flight per key.
pub struct FetchCoordinator {
    worker: WorkerHandle,
    in_flight: Mutex<HashMap<String, AbortHandle>>,
    semaphore: Arc<Semaphore>,
}

impl FetchCoordinator {
    /// Creates a coordinator with the default concurrency limit.
    #[must_use]
    pub fn new(worker: WorkerHandle) -> Self {
        Self::with_max_concurrent(worker, DEFAULT_MAX_CONCURRENT_FETCHES)
    }

    /// Creates a coordinator with a specific concurrency limit.
    #[must_use]
    pub fn with_max_concurrent(worker: WorkerHandle, max_concurrent: usize) -> Self {
        Self {
            worker,
            in_flight: Mutex::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Fetches `request` on behalf of the logical resource `key`.
    ///
    /// Any fetch already in flight for the same key is aborted first; the
    /// aborted caller sees [`CacheError::Superseded`].
    ///
    /// # Errors
    ///
    /// Propagates worker fetch errors, or [`CacheError::Superseded`] when a
    /// newer fetch for the same key replaced this one.
    pub async fn fetch(&self, key: &str, request: FetchRequest) -> CacheResult<FetchOutcome> {
        let (abort_handle, abort_registration) = AbortHandle::new_pair();

        if let Some(previous) = self
            .in_flight
            .lock()
            .insert(key.to_string(), abort_handle.clone())
        {
            debug!(key = %key, "Aborting superseded fetch");
            previous.abort();
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CacheError::WorkerGone)?;

        let result = Abortable::new(self.worker.fetch(request), abort_registration).await;

        // A successor always aborts its predecessor before taking the slot,
        // so an un-aborted fetch still owns it and must clear it.
        if !abort_handle.is_aborted() {
            self.in_flight.lock().remove(key);
        }

        match result {
            Ok(outcome) => outcome,
            Err(futures_util::future::Aborted) => Err(CacheError::Superseded(key.to_string())),
        }
    }

    /// Aborts the in-flight fetch for a key, if any.
    pub fn cancel(&self, key: &str) {
        if let Some(handle) = self.in_flight.lock().remove(key) {
            handle.abort();
            debug!(key = %key, "Cancelled fetch");
        }
    }

    /// Aborts every in-flight fetch.
    pub fn cancel_all(&self) {
        let mut in_flight = self.in_flight.lock();
        let count = in_flight.len();
        for (_, handle) in in_flight.drain() {
            handle.abort();
        }
        if count > 0 {
            debug!(count = count, "Cancelled all fetches");
        }
    }

    /// Returns true while a fetch for the key is in flight.
    #[must_use]
    pub fn is_fetching(&self, key: &str) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    /// Number of fetches currently in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Drop for FetchCoordinator {
    fn drop(&mut self) {
        let in_flight = self.in_flight.lock();
        if !in_flight.is_empty() {
            error!(count = in_flight.len(), "Coordinator dropped with fetches in flight");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::domain::entities::{CacheGeneration, CachedResponse, ResponseSource};
    use crate::domain::ports::mocks::MockKeyValueStore;
    use crate::infrastructure::cache::MemoryCacheStore;
    use crate::infrastructure::worker::{NetworkPort, RequestDestination};

    /// Network that delays every response long enough for a successor
    /// fetch to land first.
    struct SlowNetwork {
        delay: Duration,
    }

    #[async_trait]
    impl NetworkPort for SlowNetwork {
        async fn fetch(&self, _url: &str) -> CacheResult<CachedResponse> {
            tokio::time::sleep(self.delay).await;
            Ok(CachedResponse::new(200, None, Bytes::from_static(b"ok")))
        }
    }

    fn coordinator(delay: Duration) -> Arc<FetchCoordinator> {
        let (worker, _events) = WorkerHandle::spawn(
            CacheGeneration::new("test"),
            Arc::new(MemoryCacheStore::new()),
            Arc::new(SlowNetwork { delay }),
            Arc::new(MockKeyValueStore::new()),
        );
        Arc::new(FetchCoordinator::new(worker))
    }

    fn image_request(url: &str) -> FetchRequest {
        FetchRequest {
            url: url.to_string(),
            destination: RequestDestination::Image,
        }
    }

    #[tokio::test]
    async fn test_newer_fetch_supersedes_older() {
        let coordinator = coordinator(Duration::from_millis(100));

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .fetch("slot", image_request("https://cdn.example.test/a.webp"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = coordinator
            .fetch("slot", image_request("https://cdn.example.test/b.webp"))
            .await
            .unwrap();
        assert_eq!(second.source, ResponseSource::Network);

        let first = first.await.unwrap();
        assert!(matches!(first, Err(CacheError::Superseded(_))));
        assert!(!coordinator.is_fetching("slot"));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_interfere() {
        let coordinator = coordinator(Duration::from_millis(10));

        let a = coordinator
            .fetch("slot-a", image_request("https://cdn.example.test/a.webp"))
            .await;
        let b = coordinator
            .fetch("slot-b", image_request("https://cdn.example.test/b.webp"))
            .await;

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_fetch() {
        let coordinator = coordinator(Duration::from_millis(200));

        let task = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .fetch("slot", image_request("https://cdn.example.test/a.webp"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        coordinator.cancel("slot");

        let result = task.await.unwrap();
        assert!(matches!(result, Err(CacheError::Superseded(_))));
        assert!(!coordinator.is_fetching("slot"));
    }
}

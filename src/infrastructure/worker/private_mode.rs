//! Private-browsing detection.
//!
//! Private mode is probed by writing and deleting a key in the key-value
//! store; any write failure means storage is restricted and caching must be
//! disabled for the session. The probe is bounded by a wall-clock timeout so
//! an ambiguous result never blocks startup: on timeout, "not private" is
//! assumed.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::domain::ports::KeyValueStorePort;

/// Upper bound on the probe; past it "not private" is assumed.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(50);

const PROBE_KEY: &str = "pixelsync:probe";

/// Probes the key-value store for private-mode storage restrictions.
pub async fn detect_private_mode(kv: Arc<dyn KeyValueStorePort>) -> bool {
    let probe = tokio::task::spawn_blocking(move || match kv.set(PROBE_KEY, "1") {
        Ok(()) => {
            kv.remove(PROBE_KEY);
            false
        }
        Err(e) => {
            warn!(error = %e, "Storage probe failed, assuming private mode");
            true
        }
    });

    match timeout(PROBE_TIMEOUT, probe).await {
        Ok(Ok(private)) => {
            debug!(private, "Private-mode probe finished");
            private
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Private-mode probe panicked, assuming private mode");
            true
        }
        Err(_) => {
            debug!("Private-mode probe timed out, assuming not private");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::MockKeyValueStore;

    #[tokio::test]
    async fn test_writable_store_is_not_private() {
        let kv = Arc::new(MockKeyValueStore::new());
        assert!(!detect_private_mode(kv.clone()).await);
        // the probe key is cleaned up
        assert!(kv.get(PROBE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_rejected_write_means_private() {
        let kv = Arc::new(MockKeyValueStore::read_only());
        assert!(detect_private_mode(kv).await);
    }
}

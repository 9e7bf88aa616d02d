//! Versioned message protocol between the main context and the worker.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::domain::entities::{CachedResponse, ResponseSource};
use crate::domain::errors::CacheResult;

/// Protocol version. Bump on any incompatible message change.
pub const PROTOCOL_VERSION: u8 = 1;

/// Messages a client may post to the worker, on the wire as
/// `{"type": "..."}`. Operational full-purge aliases map onto
/// [`ClientMessage::ClearCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Activate a waiting worker immediately.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    /// Delete every cache by name, no pattern matching.
    #[serde(
        rename = "CLEAR_CACHE",
        alias = "FORCE_CACHE_CLEAR",
        alias = "CLEAR_ALL_CACHES",
        alias = "CLEAR_ALL_CACHE"
    )]
    ClearCache,
}

/// What kind of element a fetch is for; selects the cache partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDestination {
    /// A page navigation.
    Document,
    /// An image element.
    Image,
    /// A stylesheet.
    Style,
    /// A script.
    Script,
    /// Anything else.
    Other,
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Request URL.
    pub url: String,
    /// Request destination.
    pub destination: RequestDestination,
}

impl FetchRequest {
    /// Convenience constructor.
    #[must_use]
    pub fn new(url: impl Into<String>, destination: RequestDestination) -> Self {
        Self {
            url: url.into(),
            destination,
        }
    }

    /// True for page navigations, which get a synthesized offline fallback.
    #[must_use]
    pub const fn is_navigation(&self) -> bool {
        matches!(self.destination, RequestDestination::Document)
    }
}

/// A served response plus where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// The response to hand to the requester.
    pub response: CachedResponse,
    /// Which layer produced it.
    pub source: ResponseSource,
}

/// Commands accepted on the worker's mailbox.
#[derive(Debug)]
pub enum WorkerCommand {
    /// Run the install step (private-mode probe + pre-cache).
    Install,
    /// Run the activate step (stale-generation cleanup + client claim).
    Activate,
    /// Check for a new generation; an already-active worker goes to waiting.
    /// The reply fires once the check has been processed, so callers can
    /// read the waiting state without racing the mailbox.
    Update {
        /// Signalled after the update ran.
        reply: oneshot::Sender<()>,
    },
    /// Serve one intercepted request.
    Fetch {
        /// The intercepted request.
        request: FetchRequest,
        /// Where to send the outcome.
        reply: oneshot::Sender<CacheResult<FetchOutcome>>,
    },
    /// A client-posted protocol message.
    Client(ClientMessage),
    /// Stop the actor.
    Shutdown,
}

/// Lifecycle events emitted by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Install finished.
    Installed {
        /// Assets successfully pre-cached.
        precached: usize,
        /// Whether caching is disabled for this session.
        private_mode: bool,
    },
    /// Activate finished.
    Activated {
        /// Stale-generation caches removed.
        removed_caches: usize,
    },
    /// A new generation installed and is waiting to activate.
    Waiting,
    /// A waiting worker was told to activate.
    SkippedWaiting,
    /// Every cache was deleted on client request.
    CacheCleared,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(r#"{"type": "CLEAR_CACHE"}"#; "canonical")]
    #[test_case(r#"{"type": "FORCE_CACHE_CLEAR"}"#; "force alias")]
    #[test_case(r#"{"type": "CLEAR_ALL_CACHES"}"#; "plural alias")]
    #[test_case(r#"{"type": "CLEAR_ALL_CACHE"}"#; "singular alias")]
    fn test_clear_cache_aliases(raw: &str) {
        let message: ClientMessage = serde_json::from_str(raw).expect("parse");
        assert_eq!(message, ClientMessage::ClearCache);
    }

    #[test]
    fn test_skip_waiting_wire_format() {
        let message: ClientMessage = serde_json::from_str(r#"{"type": "SKIP_WAITING"}"#).unwrap();
        assert_eq!(message, ClientMessage::SkipWaiting);

        let encoded = serde_json::to_string(&ClientMessage::SkipWaiting).unwrap();
        assert_eq!(encoded, r#"{"type":"SKIP_WAITING"}"#);
    }

    #[test]
    fn test_navigation_detection() {
        assert!(FetchRequest::new("/", RequestDestination::Document).is_navigation());
        assert!(!FetchRequest::new("/a.webp", RequestDestination::Image).is_navigation());
    }
}

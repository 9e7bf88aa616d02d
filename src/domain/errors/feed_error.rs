//! Errors raised by the realtime change feed.

use std::io;

use thiserror::Error;

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors that can occur on the change-feed connection.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Could not establish the connection.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        /// Underlying failure description.
        message: String,
    },

    /// The connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Close reason supplied by the peer, if any.
        reason: String,
    },

    /// Transport-level websocket error.
    #[error("websocket error: {message}")]
    WebSocket {
        /// Underlying failure description.
        message: String,
    },

    /// A channel join was refused by the server.
    #[error("subscription refused for {topic}: {reason}")]
    SubscriptionRefused {
        /// Topic that was refused.
        topic: String,
        /// Server-supplied reason.
        reason: String,
    },

    /// No heartbeat acknowledgment within the expected window.
    #[error("heartbeat timeout: no acknowledgment received")]
    HeartbeatTimeout,

    /// A payload could not be serialized or parsed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Underlying failure description.
        message: String,
    },

    /// Timed out waiting for a protocol step.
    #[error("timeout waiting for {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },

    /// Gave up after the configured number of reconnect attempts.
    #[error("reconnection limit exceeded after {attempts} attempts")]
    ReconnectLimitExceeded {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// Not connected to the feed.
    #[error("not connected to feed")]
    NotConnected,

    /// A connection is already running.
    #[error("already connecting or connected")]
    AlreadyConnected,

    /// The client is shutting down.
    #[error("feed shutting down")]
    ShuttingDown,

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl FeedError {
    /// Constructor for connection failures.
    #[must_use]
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Constructor for websocket failures.
    #[must_use]
    pub fn websocket(message: impl Into<String>) -> Self {
        Self::WebSocket {
            message: message.into(),
        }
    }

    /// Constructor for serialization failures.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Constructor for protocol-step timeouts.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// True when the reconnect loop should try again after this error.
    #[must_use]
    pub const fn should_reconnect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::ConnectionClosed { .. }
                | Self::WebSocket { .. }
                | Self::HeartbeatTimeout
                | Self::Timeout { .. }
                | Self::Io(_)
        )
    }

    /// True when the error leaves the subscription dead for good.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionRefused { .. }
                | Self::ReconnectLimitExceeded { .. }
                | Self::ShuttingDown
        )
    }
}

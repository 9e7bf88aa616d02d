//! Realtime change feed.
//!
//! Subscribes to one channel per watched content table over a
//! Phoenix-style websocket, turns row-change frames into typed
//! [`ChangeEvent`](crate::domain::entities::ChangeEvent)s, and reconnects
//! on its own with exponential backoff.

mod client;
mod connection;
mod heartbeat;
mod payloads;

pub use client::{FeedClient, FeedClientConfig, FeedEvent, calculate_backoff_delay};
pub use connection::{FeedConnection, WebSocketFeedConnection};
pub use heartbeat::HeartbeatManager;
pub use payloads::FeedFrame;

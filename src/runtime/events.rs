//! Events published by the running engine.

use crate::domain::entities::{ChangeEvent, TableName};

/// Broadcast to embedders observing the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The cache worker finished installing.
    WorkerReady,
    /// The change feed connected and is subscribing.
    FeedConnected,
    /// A table subscription was acknowledged.
    FeedSubscribed {
        /// The joined table.
        table: TableName,
    },
    /// The feed dropped; a reconnect may follow.
    FeedDisconnected {
        /// Human-readable reason.
        reason: String,
    },
    /// A change event was applied to the caches.
    ChangeApplied {
        /// The event that was applied.
        event: ChangeEvent,
        /// Entries purged while applying it.
        purged: usize,
        /// Whether a full page reload was scheduled.
        reload_scheduled: bool,
    },
    /// A manual sync pass completed.
    ManualSyncCompleted {
        /// Entries purged by the pass.
        purged: usize,
    },
    /// Every cache layer was wiped.
    CachesCleared,
    /// A non-recoverable error stopped part of the engine.
    Fault {
        /// Human-readable description.
        message: String,
    },
}

//! Real-time change dispatch.
//!
//! Applies each table's [`SyncPolicy`] when a change event arrives: purge
//! the affected cache entries, optionally force an image refresh, notify the
//! user, and for content that affects first paint schedule a full reload.
//! Events are handled independently; a failure against one table never
//! blocks another.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::application::services::cache_manager::CacheManager;
use crate::domain::entities::{ChangeEvent, SyncPolicy, TableName};
use crate::domain::ports::{NotificationPort, RenderSurfacePort};

/// Default delay before a forced reload, long enough for purges to land.
pub const DEFAULT_RELOAD_DELAY: Duration = Duration::from_millis(1500);

/// Generic patterns re-checked by a manual sync regardless of table.
const MANUAL_SYNC_PATTERNS: [&str; 3] = ["*/api/*", "*/storage/*", "*.webp"];

/// What one dispatched event did. Surfaced so the runtime can publish it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Cache entries deleted.
    pub purged: usize,
    /// Image elements force-refreshed.
    pub refreshed: usize,
    /// Whether a full reload was scheduled.
    pub reload_scheduled: bool,
}

/// Dispatches change events through the cache manager and notification port.
pub struct SyncDispatcher {
    cache_manager: Arc<CacheManager>,
    notifier: Arc<dyn NotificationPort>,
    surface: Arc<dyn RenderSurfacePort>,
    reload_delay: Duration,
}

impl SyncDispatcher {
    /// Creates a dispatcher with the default reload delay.
    #[must_use]
    pub fn new(
        cache_manager: Arc<CacheManager>,
        notifier: Arc<dyn NotificationPort>,
        surface: Arc<dyn RenderSurfacePort>,
    ) -> Self {
        Self {
            cache_manager,
            notifier,
            surface,
            reload_delay: DEFAULT_RELOAD_DELAY,
        }
    }

    /// Overrides the forced-reload delay.
    #[must_use]
    pub const fn with_reload_delay(mut self, delay: Duration) -> Self {
        self.reload_delay = delay;
        self
    }

    /// Handles one change event per its table's policy.
    ///
    /// Cache failures are absorbed inside the manager; the notification is
    /// shown regardless of purge results.
    pub async fn handle_event(&self, event: &ChangeEvent) -> SyncOutcome {
        let policy = event.table.policy();
        info!(
            table = %event.table,
            kind = %event.kind,
            reload = policy.force_reload,
            "Dispatching change event"
        );

        let outcome = self.apply_policy(event.table, &policy).await;

        self.notifier.send(
            "Content updated",
            &format!("{} changed ({})", event.table, event.kind),
        );

        outcome
    }

    async fn apply_policy(&self, table: TableName, policy: &SyncPolicy) -> SyncOutcome {
        // When the policy asks for a full image refresh, the refresh is the
        // only thing that cache-busts elements; the purge then only deletes
        // entries, so no image is reloaded twice for one event.
        let (purged, refreshed) = if policy.refresh_images {
            let purged = self.cache_manager.purge_entries(&policy.purge_patterns).await;
            let refreshed = self.cache_manager.refresh_images(&["*".to_string()]);
            (purged, refreshed)
        } else {
            (self.cache_manager.purge(&policy.purge_patterns).await, 0)
        };

        let reload_scheduled = policy.force_reload;
        if reload_scheduled {
            // First-paint content cannot be hot-swapped.
            let surface = self.surface.clone();
            let delay = self.reload_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                warn!(table = %table, "Forcing full reload for first-paint content");
                surface.reload_page();
            });
        }

        SyncOutcome {
            purged,
            refreshed,
            reload_scheduled,
        }
    }

    /// Re-runs invalidation unconditionally for every watched table.
    pub async fn manual_sync(&self) -> SyncOutcome {
        info!("Manual sync requested");
        let patterns: Vec<String> = MANUAL_SYNC_PATTERNS
            .iter()
            .map(ToString::to_string)
            .collect();
        let purged = self.cache_manager.purge_entries(&patterns).await;
        let refreshed = self.cache_manager.refresh_images(&["*".to_string()]);
        SyncOutcome {
            purged,
            refreshed,
            reload_scheduled: false,
        }
    }

    /// Escalates to the nuclear clear.
    pub async fn clear_all_caches(&self) {
        self.cache_manager.nuclear_clear().await;
    }
}

//! Engine wiring the caches, worker, feed and dispatcher together.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};
use tokio::sync::{Notify, broadcast, mpsc};
use tracing::{info, warn};

use crate::application::services::{CacheManager, Resolver, SourcePriority, SyncDispatcher};
use crate::domain::entities::{
    CacheGeneration, FallbackChain, FeatureFlags, ImageSource, ResolvedSource,
};
use crate::domain::errors::CacheResult;
use crate::domain::ports::{CacheStorePort, KeyValueStorePort, RenderSurfacePort};
use crate::infrastructure::cache::{DiskCacheStore, QueryCache};
use crate::infrastructure::config::{AppConfig, FlagsStore};
use crate::infrastructure::feed::{FeedClient, FeedClientConfig, FeedEvent};
use crate::infrastructure::fetch::FetchCoordinator;
use crate::infrastructure::notifications::DesktopNotificationService;
use crate::infrastructure::storage::FileKeyValueStore;
use crate::infrastructure::surface::LogRenderSurface;
use crate::infrastructure::worker::{
    FetchOutcome, FetchRequest, HttpNetwork, WorkerEvent, WorkerHandle,
};

use super::events::EngineEvent;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);
const KV_FILE_NAME: &str = "kv.json";

/// Top-level runtime owning every long-lived component.
pub struct Engine {
    config: AppConfig,
    resolver: Resolver,
    flags_store: FlagsStore,
    cache_manager: Arc<CacheManager>,
    dispatcher: Arc<SyncDispatcher>,
    fetcher: FetchCoordinator,
    worker: WorkerHandle,
    worker_events: mpsc::UnboundedReceiver<WorkerEvent>,
    feed: Option<FeedClient>,
    surface: Arc<LogRenderSurface>,
    event_tx: broadcast::Sender<EngineEvent>,
    shutdown: Arc<Notify>,
}

impl Engine {
    /// Builds the engine from configuration: opens the stores, spawns the
    /// worker actor and wires the dispatcher. The feed starts in [`run`].
    ///
    /// [`run`]: Engine::run
    ///
    /// # Errors
    ///
    /// Returns an error when a store cannot be opened or the HTTP client
    /// cannot be built.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn CacheStorePort> = match &config.cache.dir {
            Some(dir) => Arc::new(
                DiskCacheStore::new(dir.clone(), config.cache.max_disk_bytes).await?,
            ),
            None => Arc::new(DiskCacheStore::default_location().await?),
        };

        let kv_path = AppConfig::default_config_dir()
            .ok_or_else(|| eyre!("could not determine config directory"))?
            .join(KV_FILE_NAME);
        let kv: Arc<dyn KeyValueStorePort> = Arc::new(FileKeyValueStore::open(kv_path)?);

        let network = Arc::new(HttpNetwork::new(NETWORK_TIMEOUT, config.origin.clone())?);
        let (worker, worker_events) = WorkerHandle::spawn(
            CacheGeneration::current(),
            Arc::clone(&store),
            network,
            Arc::clone(&kv),
        );

        let surface = Arc::new(LogRenderSurface::new());
        let query_cache = Arc::new(QueryCache::new(config.cache.query_capacity));
        let notifier = Arc::new(DesktopNotificationService::new(
            config.enable_desktop_notifications,
        ));

        let cache_manager = Arc::new(CacheManager::new(
            Arc::clone(&store),
            Arc::clone(&surface) as Arc<dyn RenderSurfacePort>,
            Arc::new(worker.clone()),
            query_cache,
            Arc::clone(&kv),
        ));
        let dispatcher = Arc::new(SyncDispatcher::new(
            Arc::clone(&cache_manager),
            notifier,
            Arc::clone(&surface) as Arc<dyn RenderSurfacePort>,
        ));

        let flags_store = FlagsStore::new(Arc::clone(&kv));
        let resolver = Resolver::new(SourcePriority::new(config.resolver.priority.clone()));
        let fetcher = FetchCoordinator::new(worker.clone());

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            resolver,
            flags_store,
            cache_manager,
            dispatcher,
            fetcher,
            worker,
            worker_events,
            feed: None,
            surface,
            event_tx,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Subscribes to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// The rendering surface adapter, for registering element URLs.
    #[must_use]
    pub fn surface(&self) -> Arc<LogRenderSurface> {
        Arc::clone(&self.surface)
    }

    /// The cache manager, for direct purge and refresh operations.
    #[must_use]
    pub fn cache_manager(&self) -> Arc<CacheManager> {
        Arc::clone(&self.cache_manager)
    }

    /// Resolves the best candidate for an image source.
    ///
    /// Flags are re-read from the key-value store on every call, so a
    /// [`save_flags`](Engine::save_flags) from elsewhere takes effect on
    /// the next resolution.
    #[must_use]
    pub fn resolve(&self, source: &ImageSource) -> ResolvedSource {
        self.resolver.resolve(source, &self.current_flags())
    }

    /// Full candidate chain for an image source.
    #[must_use]
    pub fn fallback_chain(&self, source: &ImageSource) -> FallbackChain {
        self.resolver.chain(source, &self.current_flags())
    }

    /// Persists updated feature flags for subsequent resolutions.
    ///
    /// # Errors
    ///
    /// Returns an error when the key-value store rejects the write.
    pub fn save_flags(&self, flags: &FeatureFlags) -> CacheResult<()> {
        self.flags_store.save(flags)
    }

    fn current_flags(&self) -> FeatureFlags {
        self.flags_store.load(self.config.resolver.flags())
    }

    /// Fetches `request` through the worker, one in-flight fetch per key.
    ///
    /// A newer fetch for the same key aborts this one; the aborted caller
    /// gets [`CacheError::Superseded`](crate::domain::errors::CacheError::Superseded).
    ///
    /// # Errors
    ///
    /// Propagates worker fetch errors or the superseded error.
    pub async fn fetch(&self, key: &str, request: FetchRequest) -> CacheResult<FetchOutcome> {
        self.fetcher.fetch(key, request).await
    }

    /// Runs a manual sync pass over the standard content patterns.
    pub async fn manual_sync(&self) {
        let outcome = self.dispatcher.manual_sync().await;
        let _ = self.event_tx.send(EngineEvent::ManualSyncCompleted {
            purged: outcome.purged,
        });
    }

    /// Wipes every cache layer and schedules a reload.
    pub async fn nuclear_clear(&self) {
        self.dispatcher.clear_all_caches().await;
        let _ = self.event_tx.send(EngineEvent::CachesCleared);
    }

    /// Signals the running engine to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Runs the engine until [`shutdown`] is called.
    ///
    /// Installs and activates the worker, connects the change feed when one
    /// is configured, and applies every incoming change event.
    ///
    /// [`shutdown`]: Engine::shutdown
    ///
    /// # Errors
    ///
    /// Returns an error when the worker actor dies or the feed fails
    /// non-recoverably with reconnection disabled.
    pub async fn run(&mut self) -> Result<()> {
        self.worker.install()?;
        self.worker.activate()?;

        let mut feed_rx = self.start_feed()?;
        let shutdown = Arc::clone(&self.shutdown);

        loop {
            let tick = tokio::select! {
                () = shutdown.notified() => Tick::Shutdown,
                event = self.worker_events.recv() => Tick::Worker(event),
                event = recv_feed(&mut feed_rx) => Tick::Feed(event),
            };

            match tick {
                Tick::Shutdown => {
                    info!("Engine shutting down");
                    break;
                }
                Tick::Worker(Some(event)) => self.handle_worker_event(event),
                Tick::Worker(None) => return Err(eyre!("worker actor stopped unexpectedly")),
                Tick::Feed(Some(event)) => self.handle_feed_event(event).await,
                Tick::Feed(None) => {
                    warn!("Feed loop terminated");
                    feed_rx = None;
                }
            }
        }

        if let Some(feed) = &self.feed {
            feed.disconnect();
        }
        self.fetcher.cancel_all();
        self.worker.shutdown();
        Ok(())
    }

    fn start_feed(&mut self) -> Result<Option<mpsc::UnboundedReceiver<FeedEvent>>> {
        let Some(url) = self.config.feed.url.clone() else {
            info!("No feed endpoint configured, realtime sync disabled");
            return Ok(None);
        };

        let feed_config = FeedClientConfig::new(url)
            .with_tables(self.config.feed.effective_tables())
            .with_heartbeat_interval(self.config.feed.heartbeat_interval())
            .with_auto_reconnect(self.config.feed.auto_reconnect)
            .with_max_reconnect_attempts(self.config.feed.max_reconnect_attempts);

        let mut client = FeedClient::new(feed_config);
        let rx = client.connect()?;
        self.feed = Some(client);
        Ok(Some(rx))
    }

    fn handle_worker_event(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::Installed {
                precached,
                private_mode,
            } => {
                info!(precached, private_mode, "Worker installed");
            }
            WorkerEvent::Activated { removed_caches } => {
                info!(removed_caches, "Worker activated");
                let _ = self.event_tx.send(EngineEvent::WorkerReady);
            }
            WorkerEvent::Waiting => info!("New worker version waiting"),
            WorkerEvent::SkippedWaiting => info!("Worker skipped waiting"),
            WorkerEvent::CacheCleared => info!("Worker cleared all caches"),
        }
    }

    async fn handle_feed_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::Connected => {
                let _ = self.event_tx.send(EngineEvent::FeedConnected);
            }
            FeedEvent::Subscribed { table } => {
                let _ = self.event_tx.send(EngineEvent::FeedSubscribed { table });
            }
            FeedEvent::Disconnected { reason } => {
                let _ = self.event_tx.send(EngineEvent::FeedDisconnected { reason });
            }
            FeedEvent::Reconnecting { attempt } => {
                info!(attempt, "Feed reconnecting");
            }
            FeedEvent::Change(change) => {
                let outcome = self.dispatcher.handle_event(&change).await;
                let _ = self.event_tx.send(EngineEvent::ChangeApplied {
                    event: change,
                    purged: outcome.purged,
                    reload_scheduled: outcome.reload_scheduled,
                });
            }
            FeedEvent::Error {
                message,
                recoverable,
            } => {
                warn!(message = %message, recoverable, "Feed error");
                if !recoverable {
                    let _ = self.event_tx.send(EngineEvent::Fault { message });
                }
            }
        }
    }
}

enum Tick {
    Shutdown,
    Worker(Option<WorkerEvent>),
    Feed(Option<FeedEvent>),
}

async fn recv_feed(rx: &mut Option<mpsc::UnboundedReceiver<FeedEvent>>) -> Option<FeedEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => {
            // No feed; park this branch forever.
            std::future::pending().await
        }
    }
}

//! The worker actor: lifecycle handling and the network-first fetch path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::entities::{CacheGeneration, CachedResponse, ResponseSource};
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::{CacheStorePort, KeyValueStorePort};

use super::private_mode::detect_private_mode;
use super::protocol::{ClientMessage, FetchOutcome, FetchRequest, WorkerCommand, WorkerEvent};
use super::strategy::{PRECACHE_ASSETS, cache_partition, offline_response, should_bypass};

/// Port for the worker's network access.
#[async_trait]
pub trait NetworkPort: Send + Sync {
    /// Fetches a URL, returning status, content type and body.
    ///
    /// # Errors
    /// Returns a network error when the origin is unreachable.
    async fn fetch(&self, url: &str) -> CacheResult<CachedResponse>;
}

/// Reqwest-backed network adapter.
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Option<String>,
}

impl HttpNetwork {
    /// Creates the adapter with a request timeout and an optional site
    /// origin. Asset paths like `/manifest.json` are resolved against the
    /// origin before the request goes out.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: std::time::Duration, origin: Option<String>) -> CacheResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            origin: origin.map(|o| o.trim_end_matches('/').to_string()),
        })
    }

    fn absolute_url(&self, url: &str) -> CacheResult<String> {
        if !url.starts_with('/') {
            return Ok(url.to_string());
        }
        match &self.origin {
            Some(origin) => Ok(format!("{origin}{url}")),
            None => Err(CacheError::network(format!(
                "no site origin configured to resolve {url}"
            ))),
        }
    }
}

#[async_trait]
impl NetworkPort for HttpNetwork {
    async fn fetch(&self, url: &str) -> CacheResult<CachedResponse> {
        let url = self.absolute_url(url)?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CacheError::network(format!("Request failed: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::network(format!("Failed to read body: {e}")))?;

        Ok(CachedResponse::new(status, content_type, Bytes::from(body)))
    }
}

/// The worker's private state and mailbox loop.
pub struct WorkerActor {
    generation: CacheGeneration,
    store: Arc<dyn CacheStorePort>,
    network: Arc<dyn NetworkPort>,
    kv: Arc<dyn KeyValueStorePort>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
    cmd_rx: mpsc::UnboundedReceiver<WorkerCommand>,
    waiting: Arc<AtomicBool>,
    private_mode: bool,
    active: bool,
}

impl WorkerActor {
    pub(super) fn new(
        generation: CacheGeneration,
        store: Arc<dyn CacheStorePort>,
        network: Arc<dyn NetworkPort>,
        kv: Arc<dyn KeyValueStorePort>,
        event_tx: mpsc::UnboundedSender<WorkerEvent>,
        cmd_rx: mpsc::UnboundedReceiver<WorkerCommand>,
        waiting: Arc<AtomicBool>,
    ) -> Self {
        Self {
            generation,
            store,
            network,
            kv,
            event_tx,
            cmd_rx,
            waiting,
            private_mode: false,
            active: false,
        }
    }

    /// Runs the mailbox loop until shutdown or every handle is dropped.
    pub async fn run(mut self) {
        info!(generation = %self.generation, "Worker started");
        while let Some(command) = self.cmd_rx.recv().await {
            match command {
                WorkerCommand::Install => self.install().await,
                WorkerCommand::Activate => self.activate().await,
                WorkerCommand::Update { reply } => {
                    self.update().await;
                    let _ = reply.send(());
                }
                WorkerCommand::Fetch { request, reply } => {
                    let outcome = self.handle_fetch(&request).await;
                    let _ = reply.send(outcome);
                }
                WorkerCommand::Client(message) => self.handle_client(message).await,
                WorkerCommand::Shutdown => break,
            }
        }
        info!("Worker stopped");
    }

    /// Install: probe for private mode, then pre-cache the minimal asset
    /// list. Per-asset failures are swallowed so install always succeeds.
    async fn install(&mut self) {
        self.private_mode = detect_private_mode(self.kv.clone()).await;
        if self.private_mode {
            info!("Private mode detected, caching disabled for this session");
            let _ = self.event_tx.send(WorkerEvent::Installed {
                precached: 0,
                private_mode: true,
            });
            return;
        }

        let static_cache = self.generation.static_cache();
        let mut precached = 0usize;
        for asset in PRECACHE_ASSETS {
            match self.network.fetch(asset).await {
                Ok(response) if response.is_ok() => {
                    if let Err(e) = self.store.put(&static_cache, asset, response).await {
                        warn!(asset, error = %e, "Failed to pre-cache asset");
                    } else {
                        precached += 1;
                    }
                }
                Ok(response) => {
                    debug!(asset, status = response.status, "Skipping non-200 pre-cache asset");
                }
                Err(e) => {
                    warn!(asset, error = %e, "Pre-cache fetch failed");
                }
            }
        }

        info!(precached, "Worker installed");
        let _ = self.event_tx.send(WorkerEvent::Installed {
            precached,
            private_mode: false,
        });
    }

    /// Activate: delete every stale-generation cache, then claim clients.
    async fn activate(&mut self) {
        let mut removed = 0usize;
        for name in self.store.cache_names().await {
            if self.generation.owns(&name) {
                continue;
            }
            match self.store.delete_cache(&name).await {
                Ok(true) => {
                    debug!(cache = %name, "Removed stale-generation cache");
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(cache = %name, error = %e, "Failed to remove stale cache"),
            }
        }

        self.active = true;
        self.waiting.store(false, Ordering::SeqCst);
        info!(removed, "Worker activated, clients claimed");
        let _ = self.event_tx.send(WorkerEvent::Activated {
            removed_caches: removed,
        });
    }

    /// Update: re-run install; an already-active worker goes to waiting
    /// until a skip-waiting message arrives.
    async fn update(&mut self) {
        let was_active = self.active;
        self.install().await;
        if was_active {
            self.waiting.store(true, Ordering::SeqCst);
            let _ = self.event_tx.send(WorkerEvent::Waiting);
        } else {
            self.activate().await;
        }
    }

    async fn handle_client(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::SkipWaiting => {
                if self.waiting.load(Ordering::SeqCst) {
                    self.activate().await;
                }
                let _ = self.event_tx.send(WorkerEvent::SkippedWaiting);
            }
            ClientMessage::ClearCache => {
                for name in self.store.cache_names().await {
                    if let Err(e) = self.store.delete_cache(&name).await {
                        warn!(cache = %name, error = %e, "Failed to clear cache");
                    }
                }
                info!("All caches cleared on client request");
                let _ = self.event_tx.send(WorkerEvent::CacheCleared);
            }
        }
    }

    /// The fetch path: never-cache and private-mode requests pass straight
    /// through; everything else is network-first with cache fallback.
    async fn handle_fetch(&self, request: &FetchRequest) -> CacheResult<FetchOutcome> {
        if self.private_mode || should_bypass(&request.url) {
            let response = self.network.fetch(&request.url).await?;
            return Ok(FetchOutcome {
                response,
                source: ResponseSource::Passthrough,
            });
        }

        match self.network.fetch(&request.url).await {
            Ok(response) => {
                if response.is_ok() {
                    let partition = cache_partition(&self.generation, request.destination);
                    if let Err(e) = self
                        .store
                        .put(&partition, &request.url, response.clone())
                        .await
                    {
                        warn!(url = %request.url, error = %e, "Failed to cache response");
                    }
                }
                Ok(FetchOutcome {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(network_error) => {
                debug!(url = %request.url, error = %network_error, "Network failed, trying cache");
                for cache in self.generation.cache_names() {
                    if let Some(response) = self.store.get(&cache, &request.url).await {
                        return Ok(FetchOutcome {
                            response,
                            source: ResponseSource::Cache,
                        });
                    }
                }
                if request.is_navigation() {
                    return Ok(FetchOutcome {
                        response: offline_response(),
                        source: ResponseSource::Offline,
                    });
                }
                Err(network_error)
            }
        }
    }
}

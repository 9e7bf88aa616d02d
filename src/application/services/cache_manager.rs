//! Cache purge and refresh primitives.
//!
//! Every operation is best-effort: a failure against one cache or one entry
//! is logged and the rest of the sequence continues. Purges are idempotent,
//! so concurrent triggers degrade to redundant work.

use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::{
    CacheStorePort, KeyValueStorePort, QueryCachePort, RenderSurfacePort, WorkerControlPort,
};

/// Key-value prefixes holding cached data, wiped by the nuclear clear.
const CACHE_KEY_PREFIXES: [&str; 3] = ["pixelsync:cache:", "query:", "img:"];

/// Options for [`CacheManager::complete_refresh`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshOptions {
    /// Also cache-bust every stylesheet bound to the render surface.
    pub force_stylesheets: bool,
}

/// Purge, refresh and escalation primitives over the injected cache layers.
pub struct CacheManager {
    store: Arc<dyn CacheStorePort>,
    surface: Arc<dyn RenderSurfacePort>,
    worker: Arc<dyn WorkerControlPort>,
    query_cache: Arc<dyn QueryCachePort>,
    kv: Arc<dyn KeyValueStorePort>,
}

impl CacheManager {
    /// Creates a manager over the given capability set.
    #[must_use]
    pub fn new(
        store: Arc<dyn CacheStorePort>,
        surface: Arc<dyn RenderSurfacePort>,
        worker: Arc<dyn WorkerControlPort>,
        query_cache: Arc<dyn QueryCachePort>,
        kv: Arc<dyn KeyValueStorePort>,
    ) -> Self {
        Self {
            store,
            surface,
            worker,
            query_cache,
            kv,
        }
    }

    /// Deletes every cache entry whose URL matches any of the glob-style
    /// patterns, then forces matching image elements to re-fetch with a
    /// cache-busted URL. Returns the number of entries deleted.
    pub async fn purge(&self, patterns: &[String]) -> usize {
        let regexes = compile_patterns(patterns);
        if regexes.is_empty() {
            return 0;
        }

        let deleted = self.delete_matching(&regexes).await;
        let reloaded = self.reload_matching_images(&regexes);
        info!(deleted, reloaded, patterns = patterns.len(), "Cache purge complete");
        deleted
    }

    /// Deletes matching cache entries without touching the render surface.
    /// Callers that follow up with a full image refresh use this so each
    /// image element is cache-busted exactly once.
    pub async fn purge_entries(&self, patterns: &[String]) -> usize {
        let regexes = compile_patterns(patterns);
        if regexes.is_empty() {
            return 0;
        }
        let deleted = self.delete_matching(&regexes).await;
        info!(deleted, patterns = patterns.len(), "Cache entries purged");
        deleted
    }

    async fn delete_matching(&self, regexes: &[Regex]) -> usize {
        let mut deleted = 0usize;
        for cache in self.store.cache_names().await {
            for url in self.store.entry_urls(&cache).await {
                if !matches_any(regexes, &url) {
                    continue;
                }
                match self.store.delete_entry(&cache, &url).await {
                    Ok(true) => deleted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(cache = %cache, url = %url, error = %e, "Failed to delete cache entry");
                    }
                }
            }
        }
        deleted
    }

    /// Forces a re-fetch of every image whose URL matches a pattern.
    pub fn refresh_images(&self, patterns: &[String]) -> usize {
        let regexes = compile_patterns(patterns);
        self.reload_matching_images(&regexes)
    }

    fn reload_matching_images(&self, regexes: &[Regex]) -> usize {
        let mut reloaded = 0usize;
        for url in self.surface.image_urls() {
            if matches_any(regexes, &url) {
                self.surface.reload_image(&url, &cache_bust(&url));
                reloaded += 1;
            }
        }
        if reloaded > 0 {
            debug!(reloaded, "Cache-busted image elements");
        }
        reloaded
    }

    /// Asks the worker to look for a new generation, then activates a
    /// waiting worker immediately.
    pub async fn refresh_worker(&self) {
        if let Err(e) = self.worker.update().await {
            warn!(error = %e, "Worker update failed");
            return;
        }
        if self.worker.has_waiting().await {
            if let Err(e) = self.worker.skip_waiting().await {
                warn!(error = %e, "Worker skip-waiting failed");
            } else {
                info!("Waiting worker activated");
            }
        }
    }

    /// Composes [`purge`](Self::purge) and
    /// [`refresh_worker`](Self::refresh_worker); optionally cache-busts every
    /// stylesheet.
    pub async fn complete_refresh(&self, patterns: &[String], options: RefreshOptions) {
        self.purge(patterns).await;
        self.refresh_worker().await;

        if options.force_stylesheets {
            let mut busted = 0usize;
            for url in self.surface.stylesheet_urls() {
                self.surface.reload_stylesheet(&url, &cache_bust(&url));
                busted += 1;
            }
            debug!(busted, "Cache-busted stylesheets");
        }
    }

    /// The escalation path: wipes every cache layer (worker caches, response
    /// store, query cache, cache-related key-value entries) and forces a hard
    /// reload of the surface.
    pub async fn nuclear_clear(&self) {
        info!("Nuclear cache clear requested");

        if let Err(e) = self.worker.clear_cache().await {
            warn!(error = %e, "Worker cache clear failed");
        }

        self.store.clear_all().await;
        self.query_cache.clear();

        for key in self.kv.keys() {
            if CACHE_KEY_PREFIXES.iter().any(|p| key.starts_with(p)) {
                self.kv.remove(&key);
            }
        }

        self.surface.reload_page();
        info!("Nuclear cache clear complete");
    }
}

/// Compiles glob-style patterns (`*` wildcard) to anchored regexes,
/// skipping and logging invalid ones.
fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match glob_to_regex(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Skipping invalid purge pattern");
                None
            }
        })
        .collect()
}

/// Compiles one glob pattern to a full-match regex.
///
/// # Errors
/// Returns [`CacheError::InvalidPattern`] if the result is not a valid regex.
pub fn glob_to_regex(pattern: &str) -> CacheResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| CacheError::InvalidPattern(e.to_string()))
}

fn matches_any(regexes: &[Regex], url: &str) -> bool {
    regexes.iter().any(|r| r.is_match(url))
}

/// Appends a timestamp cache-busting query parameter.
fn cache_bust(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}cb={}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::domain::entities::{CacheGeneration, CachedResponse};
    use crate::domain::ports::mocks::{MockKeyValueStore, MockRenderSurface};
    use crate::infrastructure::cache::{MemoryCacheStore, QueryCache};
    use crate::infrastructure::worker::{NetworkPort, WorkerEvent, WorkerHandle};

    /// Worker stub recording the commands it receives.
    #[derive(Default)]
    struct StubWorker {
        updates: std::sync::atomic::AtomicUsize,
        skips: std::sync::atomic::AtomicUsize,
        clears: std::sync::atomic::AtomicUsize,
        waiting: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl WorkerControlPort for StubWorker {
        async fn update(&self) -> CacheResult<()> {
            self.updates
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        async fn skip_waiting(&self) -> CacheResult<()> {
            self.skips.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        async fn clear_cache(&self) -> CacheResult<()> {
            self.clears
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        async fn has_waiting(&self) -> bool {
            self.waiting.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    struct Fixture {
        manager: CacheManager,
        store: Arc<MemoryCacheStore>,
        surface: Arc<MockRenderSurface>,
        worker: Arc<StubWorker>,
        query_cache: Arc<QueryCache>,
        kv: Arc<MockKeyValueStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryCacheStore::new());
        let surface = Arc::new(MockRenderSurface::new());
        let worker = Arc::new(StubWorker::default());
        let query_cache = Arc::new(QueryCache::new(16));
        let kv = Arc::new(MockKeyValueStore::new());
        let manager = CacheManager::new(
            store.clone(),
            surface.clone(),
            worker.clone(),
            query_cache.clone(),
            kv.clone(),
        );
        Fixture {
            manager,
            store,
            surface,
            worker,
            query_cache,
            kv,
        }
    }

    fn response() -> CachedResponse {
        CachedResponse::new(200, None, Bytes::from_static(b"body"))
    }

    #[tokio::test]
    async fn test_purge_deletes_matching_entries_only() {
        let f = fixture();
        f.store
            .put("static", "/img/hero-banner-1.webp", response())
            .await
            .unwrap();
        f.store
            .put("static", "/img/profile.webp", response())
            .await
            .unwrap();

        let deleted = f.manager.purge(&["*hero-banner-*".to_string()]).await;
        assert_eq!(deleted, 1);
        assert!(f.store.get("static", "/img/hero-banner-1.webp").await.is_none());
        assert!(f.store.get("static", "/img/profile.webp").await.is_some());
    }

    #[tokio::test]
    async fn test_purge_is_idempotent() {
        let f = fixture();
        f.store
            .put("runtime", "/api/models?page=1", response())
            .await
            .unwrap();

        let patterns = vec!["*/api/models*".to_string()];
        let first = f.manager.purge(&patterns).await;
        let second = f.manager.purge(&patterns).await;

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert!(f.store.entry_urls("runtime").await.is_empty());
    }

    #[tokio::test]
    async fn test_purge_cache_busts_matching_images() {
        let f = fixture();
        *f.surface.images.lock().unwrap() = vec![
            "/img/hero-banner-2.webp".to_string(),
            "/img/unrelated.webp".to_string(),
        ];

        f.manager.purge(&["*hero-banner-*".to_string()]).await;

        let reloads = f.surface.image_reloads.lock().unwrap();
        assert_eq!(reloads.len(), 1);
        assert_eq!(reloads[0].0, "/img/hero-banner-2.webp");
        assert!(reloads[0].1.contains("?cb="));
    }

    #[tokio::test]
    async fn test_purge_entries_leaves_surface_untouched() {
        let f = fixture();
        f.store
            .put("static", "/img/hero-banner-1.webp", response())
            .await
            .unwrap();
        *f.surface.images.lock().unwrap() = vec!["/img/hero-banner-1.webp".to_string()];

        let deleted = f.manager.purge_entries(&["*hero-banner-*".to_string()]).await;

        assert_eq!(deleted, 1);
        assert!(f.surface.image_reloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_pattern_does_not_abort_purge() {
        let f = fixture();
        f.store.put("static", "/a.webp", response()).await.unwrap();

        let deleted = f
            .manager
            .purge(&["*no-such-entry*".to_string(), "*.webp".to_string()])
            .await;
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn test_refresh_worker_skips_waiting_worker() {
        let f = fixture();
        f.worker
            .waiting
            .store(true, std::sync::atomic::Ordering::SeqCst);

        f.manager.refresh_worker().await;

        assert_eq!(f.worker.updates.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(f.worker.skips.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    /// Network that is always unreachable; install precache failures are
    /// swallowed, which is all these tests need.
    struct OfflineNetwork;

    #[async_trait]
    impl NetworkPort for OfflineNetwork {
        async fn fetch(&self, _url: &str) -> CacheResult<CachedResponse> {
            Err(CacheError::network("offline"))
        }
    }

    async fn next_event(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<WorkerEvent>,
    ) -> WorkerEvent {
        tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("event timeout")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_refresh_worker_activates_waiting_worker_actor() {
        let store = Arc::new(MemoryCacheStore::new());
        let (handle, mut events) = WorkerHandle::spawn(
            CacheGeneration::new("test"),
            store.clone(),
            Arc::new(OfflineNetwork),
            Arc::new(MockKeyValueStore::new()),
        );
        let manager = CacheManager::new(
            store,
            Arc::new(MockRenderSurface::new()),
            Arc::new(handle.clone()),
            Arc::new(QueryCache::new(16)),
            Arc::new(MockKeyValueStore::new()),
        );

        handle.install().unwrap();
        handle.activate().unwrap();

        // update() acknowledges only after the actor processed it, so the
        // waiting worker produced by this refresh gets its skip-waiting
        // message and activates.
        manager.refresh_worker().await;

        let mut skipped = false;
        for _ in 0..8 {
            if next_event(&mut events).await == WorkerEvent::SkippedWaiting {
                skipped = true;
                break;
            }
        }
        assert!(skipped);
        assert!(!handle.has_waiting().await);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_complete_refresh_busts_stylesheets_when_forced() {
        let f = fixture();
        *f.surface.stylesheets.lock().unwrap() = vec!["/assets/site.css".to_string()];

        f.manager
            .complete_refresh(
                &[],
                RefreshOptions {
                    force_stylesheets: true,
                },
            )
            .await;

        assert_eq!(f.surface.stylesheet_reloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nuclear_clear_wipes_every_layer() {
        let f = fixture();
        f.store.put("static", "/a.webp", response()).await.unwrap();
        f.query_cache.put("query:models", serde_json::json!({"n": 1}));
        f.kv.set("query:models", "{}").unwrap();
        f.kv.set("user:session", "keep-me").unwrap();

        f.manager.nuclear_clear().await;

        assert!(f.store.cache_names().await.is_empty());
        assert!(f.query_cache.is_empty());
        assert_eq!(f.kv.get("query:models"), None);
        assert_eq!(f.kv.get("user:session"), Some("keep-me".to_string()));
        assert_eq!(f.worker.clears.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(f.surface.reload_count(), 1);
    }

    #[test]
    fn test_glob_to_regex() {
        let regex = glob_to_regex("*hero-banner-*").unwrap();
        assert!(regex.is_match("/img/hero-banner-1.webp"));
        assert!(!regex.is_match("/img/profile.webp"));

        let exact = glob_to_regex("/api/models").unwrap();
        assert!(exact.is_match("/api/models"));
        assert!(!exact.is_match("/api/models?page=1"));
    }
}

//! Disk-backed partitioned response cache for persistence across sessions.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, trace, warn};

use crate::domain::entities::CachedResponse;
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::CacheStorePort;

/// Maximum disk cache size in bytes (50 MB default).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 50 * 1024 * 1024;

/// Sidecar metadata stored next to each body file.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    content_type: Option<String>,
    stored_at: DateTime<Utc>,
}

/// Persistent response cache; one directory per named cache, entries
/// addressed by the SHA-256 of their URL.
pub struct DiskCacheStore {
    root: PathBuf,
    max_size: u64,
    current_size: AtomicU64,
}

impl DiskCacheStore {
    /// Opens (or creates) a store rooted at the given directory.
    ///
    /// # Errors
    /// Returns an error if the root directory cannot be created or scanned.
    pub async fn new(root: PathBuf, max_size: u64) -> CacheResult<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CacheError::io(format!("Failed to create cache root: {e}")))?;

        let mut total = 0u64;
        let mut dirs = fs::read_dir(&root)
            .await
            .map_err(|e| CacheError::io(format!("Failed to read cache root: {e}")))?;
        while let Ok(Some(dir)) = dirs.next_entry().await {
            if !dir.path().is_dir() {
                continue;
            }
            if let Ok(mut entries) = fs::read_dir(dir.path()).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if let Ok(meta) = entry.metadata().await {
                        total += meta.len();
                    }
                }
            }
        }

        let store = Self {
            root,
            max_size,
            current_size: AtomicU64::new(total),
        };
        store.cleanup_if_needed().await;
        Ok(store)
    }

    /// Opens the store in the platform cache directory.
    ///
    /// # Errors
    /// Returns an error if no cache directory can be determined or created.
    pub async fn default_location() -> CacheResult<Self> {
        let root = directories::ProjectDirs::from("com", "tecknian", crate::NAME)
            .map(|dirs| dirs.cache_dir().join("responses"))
            .ok_or_else(|| CacheError::io("no cache directory available"))?;
        Self::new(root, DEFAULT_MAX_CACHE_SIZE).await
    }

    fn cache_dir(&self, cache: &str) -> PathBuf {
        self.root.join(cache)
    }

    fn entry_paths(&self, cache: &str, url: &str) -> (PathBuf, PathBuf) {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        let dir = self.cache_dir(cache);
        (dir.join(format!("{digest}.bin")), dir.join(format!("{digest}.json")))
    }

    async fn read_meta(path: &Path) -> Option<EntryMeta> {
        let raw = fs::read(path).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    /// Deletes whole caches (oldest generation directories first by modified
    /// time) until the store fits its size budget.
    async fn cleanup_if_needed(&self) {
        if self.current_size.load(Ordering::Relaxed) <= self.max_size {
            return;
        }
        warn!(
            size = self.current_size.load(Ordering::Relaxed),
            max = self.max_size,
            "Disk cache over budget, cleaning up"
        );

        let mut dirs: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        if let Ok(mut entries) = fs::read_dir(&self.root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Ok(meta) = entry.metadata().await
                    && meta.is_dir()
                {
                    let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                    dirs.push((entry.path(), modified));
                }
            }
        }
        dirs.sort_by_key(|(_, modified)| *modified);

        for (path, _) in dirs {
            if self.current_size.load(Ordering::Relaxed) <= self.max_size {
                break;
            }
            let freed = dir_size(&path).await;
            if fs::remove_dir_all(&path).await.is_ok() {
                self.current_size.fetch_sub(freed, Ordering::Relaxed);
                debug!(path = %path.display(), freed, "Removed cache directory");
            }
        }
    }
}

async fn dir_size(path: &Path) -> u64 {
    let mut total = 0u64;
    if let Ok(mut entries) = fs::read_dir(path).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Ok(meta) = entry.metadata().await {
                total += meta.len();
            }
        }
    }
    total
}

#[async_trait]
impl CacheStorePort for DiskCacheStore {
    async fn cache_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(mut entries) = fs::read_dir(&self.root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.path().is_dir()
                    && let Some(name) = entry.file_name().to_str()
                {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    async fn entry_urls(&self, cache: &str) -> Vec<String> {
        let mut urls = Vec::new();
        if let Ok(mut entries) = fs::read_dir(self.cache_dir(cache)).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json")
                    && let Some(meta) = Self::read_meta(&path).await
                {
                    urls.push(meta.url);
                }
            }
        }
        urls
    }

    async fn get(&self, cache: &str, url: &str) -> Option<CachedResponse> {
        let (body_path, meta_path) = self.entry_paths(cache, url);
        let meta = Self::read_meta(&meta_path).await?;
        let body = fs::read(&body_path).await.ok()?;
        trace!(cache = %cache, url = %url, "Disk store hit");
        Some(CachedResponse {
            status: meta.status,
            content_type: meta.content_type,
            body: Bytes::from(body),
            stored_at: meta.stored_at,
        })
    }

    async fn put(&self, cache: &str, url: &str, response: CachedResponse) -> CacheResult<()> {
        let dir = self.cache_dir(cache);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(format!("Failed to create cache dir: {e}")))?;

        let (body_path, meta_path) = self.entry_paths(cache, url);
        let meta = EntryMeta {
            url: url.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
            stored_at: response.stored_at,
        };
        let meta_raw = serde_json::to_vec(&meta)
            .map_err(|e| CacheError::store(format!("Failed to encode meta: {e}")))?;

        let written = response.body.len() as u64 + meta_raw.len() as u64;
        fs::write(&body_path, &response.body)
            .await
            .map_err(|e| CacheError::io(format!("Failed to write body: {e}")))?;
        fs::write(&meta_path, &meta_raw)
            .await
            .map_err(|e| CacheError::io(format!("Failed to write meta: {e}")))?;

        self.current_size.fetch_add(written, Ordering::Relaxed);
        self.cleanup_if_needed().await;
        debug!(cache = %cache, url = %url, bytes = written, "Persisted response");
        Ok(())
    }

    async fn delete_entry(&self, cache: &str, url: &str) -> CacheResult<bool> {
        let (body_path, meta_path) = self.entry_paths(cache, url);
        let mut freed = 0u64;
        let mut existed = false;
        for path in [&body_path, &meta_path] {
            if let Ok(meta) = fs::metadata(path).await {
                freed += meta.len();
                existed = true;
            }
        }
        let _ = fs::remove_file(&body_path).await;
        let _ = fs::remove_file(&meta_path).await;
        if existed {
            self.current_size.fetch_sub(freed, Ordering::Relaxed);
        }
        Ok(existed)
    }

    async fn delete_cache(&self, name: &str) -> CacheResult<bool> {
        let dir = self.cache_dir(name);
        if !dir.is_dir() {
            return Ok(false);
        }
        let freed = dir_size(&dir).await;
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(format!("Failed to remove cache dir: {e}")))?;
        self.current_size.fetch_sub(freed, Ordering::Relaxed);
        debug!(cache = %name, freed, "Deleted cache");
        Ok(true)
    }

    async fn clear_all(&self) {
        for name in self.cache_names().await {
            if let Err(e) = self.delete_cache(&name).await {
                warn!(cache = %name, error = %e, "Failed to delete cache");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &'static [u8]) -> CachedResponse {
        CachedResponse::new(200, Some("text/html".into()), Bytes::from_static(body))
    }

    #[tokio::test]
    async fn test_roundtrip_through_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = DiskCacheStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();

        store
            .put("pixelsync-static-test", "/index.html", response(b"<html>"))
            .await
            .unwrap();

        let found = store.get("pixelsync-static-test", "/index.html").await;
        let found = found.unwrap();
        assert_eq!(found.status, 200);
        assert_eq!(found.body, Bytes::from_static(b"<html>"));

        let urls = store.entry_urls("pixelsync-static-test").await;
        assert_eq!(urls, vec!["/index.html".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_cache_removes_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = DiskCacheStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();

        store.put("old-gen", "/a", response(b"a")).await.unwrap();
        assert!(store.delete_cache("old-gen").await.unwrap());
        assert!(!store.delete_cache("old-gen").await.unwrap());
        assert!(store.get("old-gen", "/a").await.is_none());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let store = DiskCacheStore::new(dir.path().to_path_buf(), 1024 * 1024)
                .await
                .unwrap();
            store.put("static", "/a", response(b"abc")).await.unwrap();
        }
        let reopened = DiskCacheStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();
        assert!(reopened.get("static", "/a").await.is_some());
    }
}

//! Key-value storage adapters.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::warn;

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::KeyValueStorePort;

/// Volatile key-value store.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorePort for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Key-value store persisted as a single JSON file.
///
/// Writes go through a temp file so a crash mid-write never corrupts the
/// stored map.
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    /// Opens the store backed by `path`, loading any existing content.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// existing file cannot be read.
    pub fn open(path: PathBuf) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(e.to_string()))?;
        }

        let entries = if path.exists() {
            let content =
                fs::read_to_string(&path).map_err(|e| CacheError::io(e.to_string()))?;
            match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Stored map unreadable, starting empty");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> CacheResult<()> {
        let content =
            serde_json::to_string_pretty(entries).map_err(|e| CacheError::store(e.to_string()))?;

        let parent = self
            .path
            .parent()
            .ok_or_else(|| CacheError::io("invalid path"))?;
        let mut temp_file =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| CacheError::io(e.to_string()))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| CacheError::io(e.to_string()))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| CacheError::io(e.error.to_string()))?;
        Ok(())
    }
}

impl KeyValueStorePort for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some()
            && let Err(e) = self.persist(&entries)
        {
            warn!(key = %key, error = %e, "Failed to persist removal");
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.clear();
        if let Err(e) = self.persist(&entries) {
            warn!(error = %e, "Failed to persist clear");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_basic_operations() {
        let store = MemoryKeyValueStore::new();
        store.set("pixelsync:cache:v1", "stale").unwrap();
        assert_eq!(store.get("pixelsync:cache:v1").as_deref(), Some("stale"));

        store.remove("pixelsync:cache:v1");
        assert!(store.get("pixelsync:cache:v1").is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv.json");

        {
            let store = FileKeyValueStore::open(path.clone()).unwrap();
            store.set("img:hero", "cached").unwrap();
        }

        let reopened = FileKeyValueStore::open(path).unwrap();
        assert_eq!(reopened.get("img:hero").as_deref(), Some("cached"));
    }

    #[test]
    fn test_file_store_recovers_from_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileKeyValueStore::open(path).unwrap();
        assert!(store.keys().is_empty());
        store.set("query:models", "[]").unwrap();
        assert_eq!(store.get("query:models").as_deref(), Some("[]"));
    }

    #[test]
    fn test_clear_removes_every_key() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        store.clear();
        assert!(store.keys().is_empty());
    }
}

//! Feature-flag persistence.

use std::sync::Arc;

use tracing::warn;

use crate::domain::entities::FeatureFlags;
use crate::domain::errors::CacheResult;
use crate::domain::ports::KeyValueStorePort;

const FLAGS_KEY: &str = "pixelsync:flags";

/// Persists [`FeatureFlags`] in the key-value store so hotfix toggles
/// survive restarts.
pub struct FlagsStore {
    kv: Arc<dyn KeyValueStorePort>,
}

impl FlagsStore {
    /// Creates a store backed by the given key-value adapter.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStorePort>) -> Self {
        Self { kv }
    }

    /// Loads the persisted flags, falling back to the given defaults when
    /// nothing is stored or the stored value is unreadable.
    #[must_use]
    pub fn load(&self, defaults: FeatureFlags) -> FeatureFlags {
        let Some(raw) = self.kv.get(FLAGS_KEY) else {
            return defaults;
        };
        match serde_json::from_str(&raw) {
            Ok(flags) => flags,
            Err(e) => {
                warn!(error = %e, "Stored feature flags are unreadable, using defaults");
                defaults
            }
        }
    }

    /// Persists the flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the key-value store rejects the write.
    pub fn save(&self, flags: &FeatureFlags) -> CacheResult<()> {
        let raw = serde_json::to_string(flags)
            .map_err(|e| crate::domain::errors::CacheError::store(e.to_string()))?;
        self.kv.set(FLAGS_KEY, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::MockKeyValueStore;

    #[test]
    fn test_load_returns_defaults_when_unset() {
        let store = FlagsStore::new(Arc::new(MockKeyValueStore::new()));
        let defaults = FeatureFlags {
            prefer_local_images: false,
            enable_image_proxy: true,
            auto_fix_images: true,
        };

        let loaded = store.load(defaults);
        assert!(!loaded.prefer_local_images);
        assert!(loaded.enable_image_proxy);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let store = FlagsStore::new(Arc::new(MockKeyValueStore::new()));
        let flags = FeatureFlags {
            prefer_local_images: false,
            enable_image_proxy: false,
            auto_fix_images: false,
        };

        store.save(&flags).unwrap();
        let loaded = store.load(FeatureFlags::default());
        assert!(!loaded.prefer_local_images);
        assert!(!loaded.auto_fix_images);
    }

    #[test]
    fn test_saves_are_visible_to_later_loads_on_shared_store() {
        let kv: Arc<dyn KeyValueStorePort> = Arc::new(MockKeyValueStore::new());
        let writer = FlagsStore::new(Arc::clone(&kv));
        let reader = FlagsStore::new(kv);

        let defaults = FeatureFlags {
            prefer_local_images: true,
            ..FeatureFlags::default()
        };
        assert!(reader.load(defaults).prefer_local_images);

        let toggled = FeatureFlags {
            prefer_local_images: false,
            ..defaults
        };
        writer.save(&toggled).unwrap();
        assert!(!reader.load(defaults).prefer_local_images);
    }

    #[test]
    fn test_unreadable_value_falls_back_to_defaults() {
        let kv = Arc::new(MockKeyValueStore::new());
        kv.set("pixelsync:flags", "not json").unwrap();
        let store = FlagsStore::new(kv);

        let defaults = FeatureFlags {
            prefer_local_images: true,
            enable_image_proxy: false,
            auto_fix_images: true,
        };
        let loaded = store.load(defaults);
        assert!(loaded.prefer_local_images);
        assert!(loaded.auto_fix_images);
    }
}

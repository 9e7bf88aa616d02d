//! Core entities of the image pipeline.

mod cache_entry;
mod change_event;
mod image_source;

pub use cache_entry::{CacheGeneration, CachedResponse, ResponseSource};
pub use change_event::{ChangeEvent, ChangeKind, SyncPolicy, TableName};
pub use image_source::{
    FallbackChain, FeatureFlags, ImageSource, ResolvedSource, SourceKind, STATIC_PLACEHOLDER,
};

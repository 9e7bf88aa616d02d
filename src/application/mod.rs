//! Application layer with the image pipeline services.

/// Service implementations.
pub mod services;

pub use services::{
    CacheManager, FallbackController, FallbackState, LoadEvent, RefreshOptions, Resolver,
    SourcePriority, SyncDispatcher, SyncOutcome, build_fallback_chain,
};

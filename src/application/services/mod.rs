//! Image pipeline services.

mod cache_manager;
mod fallback;
mod resolver;
mod sync_dispatcher;

pub use cache_manager::{CacheManager, RefreshOptions};
pub use fallback::{FallbackController, FallbackState, LoadEvent, next};
pub use resolver::{Resolver, SourcePriority, build_fallback_chain};
pub use sync_dispatcher::{SyncDispatcher, SyncOutcome};

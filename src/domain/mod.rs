//! Domain layer with core entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{ChangeEvent, FallbackChain, FeatureFlags, ImageSource, ResolvedSource};
pub use errors::{CacheError, FeedError};
pub use ports::{CacheStorePort, KeyValueStorePort, NotificationPort, RenderSurfacePort};

//! Fetch coordination.

mod coordinator;

pub use coordinator::{DEFAULT_MAX_CONCURRENT_FETCHES, FetchCoordinator};

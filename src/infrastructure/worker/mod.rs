//! Background cache worker.
//!
//! The worker is a message-passing actor in its own task, the analog of a
//! browser service worker: it owns the install/activate lifecycle, applies
//! the network-first fetch strategy, and answers the versioned client
//! message protocol. The main context talks to it only through
//! [`WorkerHandle`], asynchronously and unordered.

mod actor;
mod handle;
mod private_mode;
mod protocol;
mod strategy;

pub use actor::{HttpNetwork, NetworkPort, WorkerActor};
pub use handle::WorkerHandle;
pub use private_mode::{PROBE_TIMEOUT, detect_private_mode};
pub use protocol::{
    ClientMessage, FetchOutcome, FetchRequest, PROTOCOL_VERSION, RequestDestination, WorkerCommand,
    WorkerEvent,
};
pub use strategy::{OFFLINE_BODY, cache_partition, offline_response, should_bypass};

//! Pixelsync - a client-side image freshness and cache synchronization engine.
//!
//! This crate decides, per image, which candidate source to serve, keeps a
//! background cache worker and several cache layers consistent with that
//! decision, and propagates backend content changes to the running client in
//! near-real-time.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the resolver, fallback machine and cache services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for caches, the worker and the feed.
pub mod infrastructure;
/// Runtime layer wiring the engine together.
pub mod runtime;

/// Current version of the engine.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "pixelsync";

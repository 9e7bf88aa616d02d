//! Runtime layer wiring the engine together.

mod engine;
mod events;

pub use engine::Engine;
pub use events::EngineEvent;

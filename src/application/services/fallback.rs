//! Fallback rendering state machine.
//!
//! Walks a [`FallbackChain`] on load failure: `Loading(i)` advances to
//! `Loading(i + 1)` until the chain is exhausted, at which point the state
//! becomes terminal `Failed`. A successful load at any index moves to
//! `Loaded`. The transition function is pure; the controller binds it to a
//! chain and an error callback.

use tracing::{debug, warn};

use crate::domain::entities::FallbackChain;

/// Per-image-instance rendering state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    /// Attempting to load the candidate at this index.
    Loading(usize),
    /// The candidate at this index loaded successfully.
    Loaded(usize),
    /// Every candidate failed. Terminal.
    Failed,
}

impl FallbackState {
    /// Index currently displayed or attempted, if any.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Loading(i) | Self::Loaded(i) => Some(i),
            Self::Failed => None,
        }
    }

    /// True once every candidate has failed.
    #[must_use]
    pub const fn has_error(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// True once a candidate loaded.
    #[must_use]
    pub const fn is_loaded(self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Load outcome reported by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    /// The current candidate rendered.
    Success,
    /// The current candidate failed to load.
    Failure,
}

/// Pure transition function.
///
/// Terminal states absorb further events; a failure past the last candidate
/// yields `Failed` after exactly `chain_len` failed attempts.
#[must_use]
pub const fn next(state: FallbackState, event: LoadEvent, chain_len: usize) -> FallbackState {
    match (state, event) {
        (FallbackState::Loading(i), LoadEvent::Success) => FallbackState::Loaded(i),
        (FallbackState::Loading(i), LoadEvent::Failure) => {
            if i + 1 < chain_len {
                FallbackState::Loading(i + 1)
            } else {
                FallbackState::Failed
            }
        }
        (terminal, _) => terminal,
    }
}

/// Binds the state machine to a chain and an exhaustion callback.
pub struct FallbackController {
    chain: FallbackChain,
    state: FallbackState,
    error_fired: bool,
    on_error: Option<Box<dyn FnMut() + Send>>,
}

impl std::fmt::Debug for FallbackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackController")
            .field("chain", &self.chain)
            .field("state", &self.state)
            .field("error_fired", &self.error_fired)
            .finish_non_exhaustive()
    }
}

impl FallbackController {
    /// Creates a controller starting at the first candidate.
    #[must_use]
    pub fn new(chain: FallbackChain) -> Self {
        Self {
            chain,
            state: FallbackState::Loading(0),
            error_fired: false,
            on_error: None,
        }
    }

    /// Registers a callback invoked exactly once when the chain is exhausted.
    #[must_use]
    pub fn with_on_error(mut self, on_error: impl FnMut() + Send + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// URL the renderer should currently display, if any.
    #[must_use]
    pub fn current_url(&self) -> Option<&str> {
        self.state.index().and_then(|i| self.chain.get(i))
    }

    /// Current machine state.
    #[must_use]
    pub const fn state(&self) -> FallbackState {
        self.state
    }

    /// True once every candidate has failed.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.state.has_error()
    }

    /// True once a candidate loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    /// Feeds a load outcome into the machine and returns the new state.
    pub fn handle(&mut self, event: LoadEvent) -> FallbackState {
        let previous = self.state;
        self.state = next(previous, event, self.chain.len());

        match (previous, self.state) {
            (FallbackState::Loading(i), FallbackState::Loaded(_)) => {
                debug!(index = i, url = ?self.chain.get(i), "Image loaded");
            }
            (FallbackState::Loading(i), FallbackState::Loading(j)) => {
                warn!(
                    failed_index = i,
                    next_index = j,
                    next_url = ?self.chain.get(j),
                    "Image source failed, advancing through fallback chain"
                );
            }
            (FallbackState::Loading(i), FallbackState::Failed) => {
                warn!(failed_index = i, chain = %self.chain, "Fallback chain exhausted");
                if !self.error_fired {
                    self.error_fired = true;
                    if let Some(on_error) = self.on_error.as_mut() {
                        on_error();
                    }
                }
            }
            _ => {}
        }

        self.state
    }

    /// Replaces the chain, resetting to `Loading(0)` when its identity
    /// changed (upstream source or flags recomputation).
    pub fn set_chain(&mut self, chain: FallbackChain) {
        if self.chain == chain {
            return;
        }
        debug!(chain = %chain, "Fallback chain changed, resetting");
        self.chain = chain;
        self.state = FallbackState::Loading(0);
        self.error_fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chain(urls: &[&str]) -> FallbackChain {
        FallbackChain::from_candidates(urls.iter().copied())
    }

    #[test]
    fn test_success_at_first_candidate() {
        let mut controller = FallbackController::new(chain(&["/a.webp", "/b.jpg"]));
        assert_eq!(controller.current_url(), Some("/a.webp"));

        controller.handle(LoadEvent::Success);
        assert!(controller.is_loaded());
        assert_eq!(controller.state().index(), Some(0));
    }

    #[test]
    fn test_two_failures_then_success() {
        let mut controller = FallbackController::new(chain(&["/a", "/b", "/c"]));
        controller.handle(LoadEvent::Failure);
        controller.handle(LoadEvent::Failure);
        assert_eq!(controller.current_url(), Some("/c"));

        controller.handle(LoadEvent::Success);
        assert!(controller.is_loaded());
        assert!(!controller.has_error());
        assert_eq!(controller.state().index(), Some(2));
    }

    #[test]
    fn test_exhaustion_after_exactly_chain_len_failures() {
        let urls = ["/a", "/b", "/c"];
        let mut controller = FallbackController::new(chain(&urls));

        for _ in 0..urls.len() - 1 {
            controller.handle(LoadEvent::Failure);
            assert!(!controller.has_error());
        }
        controller.handle(LoadEvent::Failure);
        assert!(controller.has_error());
    }

    #[test]
    fn test_on_error_fires_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let mut controller = FallbackController::new(chain(&["/only"]))
            .with_on_error(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            });

        controller.handle(LoadEvent::Failure);
        controller.handle(LoadEvent::Failure);
        controller.handle(LoadEvent::Failure);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_terminal_states_absorb_events() {
        assert_eq!(
            next(FallbackState::Failed, LoadEvent::Success, 3),
            FallbackState::Failed
        );
        assert_eq!(
            next(FallbackState::Loaded(1), LoadEvent::Failure, 3),
            FallbackState::Loaded(1)
        );
    }

    #[test]
    fn test_chain_change_resets_state() {
        let mut controller = FallbackController::new(chain(&["/a", "/b"]));
        controller.handle(LoadEvent::Failure);
        assert_eq!(controller.state(), FallbackState::Loading(1));

        controller.set_chain(chain(&["/x", "/y"]));
        assert_eq!(controller.state(), FallbackState::Loading(0));
        assert_eq!(controller.current_url(), Some("/x"));
    }

    #[test]
    fn test_identical_chain_does_not_reset() {
        let mut controller = FallbackController::new(chain(&["/a", "/b"]));
        controller.handle(LoadEvent::Failure);

        controller.set_chain(chain(&["/a", "/b"]));
        assert_eq!(controller.state(), FallbackState::Loading(1));
    }

    #[test]
    fn test_chain_reset_rearms_on_error() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let mut controller = FallbackController::new(chain(&["/a"]))
            .with_on_error(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            });

        controller.handle(LoadEvent::Failure);
        controller.set_chain(chain(&["/b"]));
        controller.handle(LoadEvent::Failure);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}

//! Pure image source resolution.
//!
//! Maps an [`ImageSource`] plus the current [`FeatureFlags`] to a single
//! preferred URL and an ordered fallback chain. No side effects; safe to
//! call on every render.

use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    FallbackChain, FeatureFlags, ImageSource, ResolvedSource, SourceKind,
};

/// Ordered list of source kinds to try, highest priority first.
///
/// Operators can override the order in config (for example external-first
/// while local assets are being backfilled) instead of patching code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcePriority(Vec<SourceKind>);

impl SourcePriority {
    /// Creates an explicit priority order. Kinds not listed are appended in
    /// default order so a partial override never drops candidates.
    #[must_use]
    pub fn new(order: Vec<SourceKind>) -> Self {
        let mut kinds = order;
        for kind in [SourceKind::Local, SourceKind::External, SourceKind::Placeholder] {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Self(kinds)
    }

    /// External-first order, matching the operational override used while
    /// local assets are incomplete.
    #[must_use]
    pub fn external_first() -> Self {
        Self::new(vec![SourceKind::External, SourceKind::Local])
    }

    /// Effective order for the given flags: with `prefer_local_images` unset,
    /// external outranks local.
    #[must_use]
    pub fn effective(&self, flags: &FeatureFlags) -> Vec<SourceKind> {
        if flags.prefer_local_images {
            return self.0.clone();
        }
        let mut order = self.0.clone();
        let local = order.iter().position(|k| *k == SourceKind::Local);
        let external = order.iter().position(|k| *k == SourceKind::External);
        if let (Some(l), Some(e)) = (local, external)
            && l < e
        {
            order.swap(l, e);
        }
        order
    }

    /// The configured order, ignoring flags.
    #[must_use]
    pub fn kinds(&self) -> &[SourceKind] {
        &self.0
    }
}

impl Default for SourcePriority {
    fn default() -> Self {
        Self::new(vec![
            SourceKind::Local,
            SourceKind::External,
            SourceKind::Placeholder,
        ])
    }
}

/// Pure resolver from image sources to URLs.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    priority: SourcePriority,
}

impl Resolver {
    /// Creates a resolver with the given priority order.
    #[must_use]
    pub fn new(priority: SourcePriority) -> Self {
        Self { priority }
    }

    /// Resolves the preferred source URL.
    ///
    /// Never panics: an entirely empty source yields
    /// [`ResolvedSource::Unavailable`].
    #[must_use]
    pub fn resolve(&self, source: &ImageSource, flags: &FeatureFlags) -> ResolvedSource {
        for kind in self.priority.effective(flags) {
            if let Some(url) = source.candidate(kind) {
                return ResolvedSource::Url(url.to_string());
            }
        }
        ResolvedSource::Unavailable
    }

    /// Builds the full fallback chain: the resolved primary first, then every
    /// remaining candidate in priority order, deduplicated.
    #[must_use]
    pub fn chain(&self, source: &ImageSource, flags: &FeatureFlags) -> FallbackChain {
        let candidates: Vec<String> = self
            .priority
            .effective(flags)
            .into_iter()
            .filter_map(|kind| source.candidate(kind).map(ToString::to_string))
            .collect();
        match self.resolve(source, flags) {
            ResolvedSource::Url(primary) => build_fallback_chain(&primary, &candidates),
            ResolvedSource::Unavailable => FallbackChain::from_candidates(candidates),
        }
    }
}

/// Builds a fallback chain with the primary moved to the front, duplicates
/// removed preserving first-occurrence order, and the static placeholder
/// appended when nothing else survives.
#[must_use]
pub fn build_fallback_chain(primary: &str, candidates: &[String]) -> FallbackChain {
    let mut ordered: Vec<&str> = vec![primary];
    ordered.extend(candidates.iter().map(String::as_str));
    FallbackChain::from_candidates(ordered)
}

//! Image source candidates, resolution results and fallback chains.

use serde::{Deserialize, Serialize};

/// Guaranteed-available asset served when every other candidate is missing.
pub const STATIC_PLACEHOLDER: &str = "/assets/placeholder.webp";

/// A logical image reference with up to three candidate URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSource {
    /// Path to a pre-optimized, same-origin asset.
    pub local: Option<String>,
    /// Remote object-storage URL.
    pub external: Option<String>,
    /// Guaranteed-available fallback asset.
    pub placeholder: Option<String>,
}

impl ImageSource {
    /// Creates a source from optional candidate URLs, normalizing empty
    /// strings to `None`.
    #[must_use]
    pub fn new(
        local: Option<String>,
        external: Option<String>,
        placeholder: Option<String>,
    ) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            local: non_empty(local),
            external: non_empty(external),
            placeholder: non_empty(placeholder),
        }
    }

    /// Returns the candidate URL for the given kind, if present.
    #[must_use]
    pub fn candidate(&self, kind: SourceKind) -> Option<&str> {
        match kind {
            SourceKind::Local => self.local.as_deref(),
            SourceKind::External => self.external.as_deref(),
            SourceKind::Placeholder => self.placeholder.as_deref(),
        }
    }

    /// Returns true when no candidate at all is available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.local.is_none() && self.external.is_none() && self.placeholder.is_none()
    }
}

/// Kind of image source candidate, in the order config files name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Same-origin pre-optimized asset.
    Local,
    /// Remote object-storage URL.
    External,
    /// Per-item fallback asset.
    Placeholder,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::External => write!(f, "external"),
            Self::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Feature flags affecting image resolution.
///
/// Persisted through the key-value store; read at resolver-invocation time,
/// mutated only by an explicit settings save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Prefer the locally optimized asset over the external URL.
    #[serde(default)]
    pub prefer_local_images: bool,
    /// Route external URLs through the image proxy.
    #[serde(default)]
    pub enable_image_proxy: bool,
    /// Automatically request local migration of external images.
    #[serde(default)]
    pub auto_fix_images: bool,
}

/// Result of resolving an [`ImageSource`].
///
/// Resolution never fails with an exception; an entirely empty source yields
/// [`ResolvedSource::Unavailable`], never an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// A usable candidate URL.
    Url(String),
    /// No candidate was present.
    Unavailable,
}

impl ResolvedSource {
    /// Returns the resolved URL, if any.
    #[must_use]
    pub fn as_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Unavailable => None,
        }
    }

    /// Returns true if resolution produced no usable candidate.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

/// An ordered, deduplicated sequence of candidate URLs for one image.
///
/// The preferred source is always first and the chain never contains
/// duplicate entries. Derivation is deterministic for a given
/// (`ImageSource`, `FeatureFlags`) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackChain(Vec<String>);

impl FallbackChain {
    /// Builds a chain from candidates in priority order, dropping empty
    /// entries and duplicates while preserving first-occurrence order.
    /// An empty result is replaced by the static placeholder.
    #[must_use]
    pub fn from_candidates<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut urls: Vec<String> = Vec::new();
        for candidate in candidates {
            let url = candidate.into();
            if url.trim().is_empty() {
                continue;
            }
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        if urls.is_empty() {
            urls.push(STATIC_PLACEHOLDER.to_string());
        }
        Self(urls)
    }

    /// Returns the URL at the given position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Returns the preferred (first) URL.
    #[must_use]
    pub fn primary(&self) -> &str {
        // from_candidates guarantees at least the static placeholder
        &self.0[0]
    }

    /// Number of candidates in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; an empty build yields the static placeholder.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over candidate URLs in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl std::fmt::Display for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_normalizes_empty_strings() {
        let source = ImageSource::new(Some("  ".to_string()), Some("https://x/a.jpg".into()), None);
        assert!(source.local.is_none());
        assert_eq!(source.candidate(SourceKind::External), Some("https://x/a.jpg"));
    }

    #[test]
    fn test_chain_dedup_preserves_first_occurrence() {
        let chain = FallbackChain::from_candidates([
            "/img/a.webp",
            "https://x/a.jpg",
            "/img/a.webp",
            "https://x/b.jpg",
        ]);
        let urls: Vec<&str> = chain.iter().collect();
        assert_eq!(urls, vec!["/img/a.webp", "https://x/a.jpg", "https://x/b.jpg"]);
    }

    #[test]
    fn test_empty_chain_falls_back_to_static_placeholder() {
        let chain = FallbackChain::from_candidates(Vec::<String>::new());
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.primary(), STATIC_PLACEHOLDER);
    }

    #[test]
    fn test_resolved_source_sentinel() {
        let resolved = ResolvedSource::Unavailable;
        assert!(resolved.is_unavailable());
        assert_eq!(resolved.as_url(), None);
    }
}

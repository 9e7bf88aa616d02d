//! Backend change notifications and per-table synchronization policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Watched content tables. A closed set; unknown tables are dropped at the
/// feed boundary rather than widening this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    /// Escort model profiles.
    Models,
    /// Per-model gallery images.
    ModelGallery,
    /// Blog articles.
    BlogPosts,
    /// Frequently asked questions.
    Faqs,
    /// Customer reviews.
    Reviews,
    /// Hero banner slides.
    HeroSlides,
    /// Preference category definitions.
    PreferenceCategories,
    /// Homepage carousel entries.
    HomepageCarousel,
    /// Per-page SEO overrides.
    PageSeo,
    /// Site-wide SEO settings.
    SeoSettings,
}

impl TableName {
    /// All watched tables, one feed subscription each.
    pub const ALL: [Self; 10] = [
        Self::Models,
        Self::ModelGallery,
        Self::BlogPosts,
        Self::Faqs,
        Self::Reviews,
        Self::HeroSlides,
        Self::PreferenceCategories,
        Self::HomepageCarousel,
        Self::PageSeo,
        Self::SeoSettings,
    ];

    /// The wire name of the table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Models => "models",
            Self::ModelGallery => "model_gallery",
            Self::BlogPosts => "blog_posts",
            Self::Faqs => "faqs",
            Self::Reviews => "reviews",
            Self::HeroSlides => "hero_slides",
            Self::PreferenceCategories => "preference_categories",
            Self::HomepageCarousel => "homepage_carousel",
            Self::PageSeo => "page_seo",
            Self::SeoSettings => "seo_settings",
        }
    }

    /// Parses a wire table name.
    #[must_use]
    pub fn from_str_opt(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Synchronization policy applied when this table changes.
    #[must_use]
    pub fn policy(self) -> SyncPolicy {
        match self {
            Self::HeroSlides => SyncPolicy {
                purge_patterns: vec!["*hero-banner-*".into(), "*/api/hero_slides*".into()],
                refresh_images: true,
                force_reload: true,
            },
            Self::HomepageCarousel => SyncPolicy {
                purge_patterns: vec!["*carousel-*".into(), "*/api/homepage_carousel*".into()],
                refresh_images: true,
                force_reload: true,
            },
            Self::Models | Self::ModelGallery => SyncPolicy {
                purge_patterns: vec![
                    format!("*/api/{}*", self.as_str()),
                    "*/storage/*".into(),
                    "*.webp".into(),
                ],
                refresh_images: true,
                force_reload: false,
            },
            Self::BlogPosts => SyncPolicy {
                purge_patterns: vec!["*/api/blog_posts*".into(), "*blog-*".into()],
                refresh_images: true,
                force_reload: false,
            },
            Self::Faqs
            | Self::Reviews
            | Self::PreferenceCategories
            | Self::PageSeo
            | Self::SeoSettings => SyncPolicy {
                purge_patterns: vec![format!("*/api/{}*", self.as_str())],
                refresh_images: false,
                force_reload: false,
            },
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when a table changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Cache purge patterns (glob-style, `*` wildcard).
    pub purge_patterns: Vec<String>,
    /// Whether image elements bound to a render surface must be re-fetched.
    pub refresh_images: bool,
    /// Whether the content affects first paint and requires a full reload.
    pub force_reload: bool,
}

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single row-level change notification from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Table the change belongs to.
    pub table: TableName,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Raw row payload; shape varies per table and is never interpreted here.
    pub payload: Value,
    /// When the event was observed client-side.
    pub received_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(table: TableName, kind: ChangeKind, payload: Value) -> Self {
        Self {
            table,
            kind,
            payload,
            received_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_roundtrip() {
        for table in TableName::ALL {
            assert_eq!(TableName::from_str_opt(table.as_str()), Some(table));
        }
        assert_eq!(TableName::from_str_opt("unknown_table"), None);
    }

    #[test]
    fn test_critical_tables_force_reload() {
        assert!(TableName::HeroSlides.policy().force_reload);
        assert!(TableName::HomepageCarousel.policy().force_reload);
        assert!(!TableName::Reviews.policy().force_reload);
        assert!(!TableName::SeoSettings.policy().force_reload);
    }

    #[test]
    fn test_image_bearing_tables_refresh_images() {
        assert!(TableName::Models.policy().refresh_images);
        assert!(TableName::ModelGallery.policy().refresh_images);
        assert!(!TableName::Faqs.policy().refresh_images);
    }

    #[test]
    fn test_change_kind_wire_format() {
        let kind: ChangeKind = serde_json::from_str("\"INSERT\"").expect("parse");
        assert_eq!(kind, ChangeKind::Insert);
    }
}

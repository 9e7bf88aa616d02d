//! In-process rendering surface adapter.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::info;

use crate::domain::ports::RenderSurfacePort;

/// Surface that tracks registered element URLs and logs reloads.
///
/// Embedders with a real rendering layer implement
/// [`RenderSurfacePort`] themselves; this adapter serves headless runs,
/// where a "reload" is an observable log line and a counter.
#[derive(Default)]
pub struct LogRenderSurface {
    images: Mutex<Vec<String>>,
    stylesheets: Mutex<Vec<String>>,
    page_reloads: AtomicUsize,
}

impl LogRenderSurface {
    /// Creates an empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an image element by URL.
    pub fn register_image(&self, url: impl Into<String>) {
        self.images.lock().push(url.into());
    }

    /// Registers a stylesheet link by URL.
    pub fn register_stylesheet(&self, url: impl Into<String>) {
        self.stylesheets.lock().push(url.into());
    }

    /// Number of page reloads triggered so far.
    #[must_use]
    pub fn page_reload_count(&self) -> usize {
        self.page_reloads.load(Ordering::SeqCst)
    }
}

impl RenderSurfacePort for LogRenderSurface {
    fn image_urls(&self) -> Vec<String> {
        self.images.lock().clone()
    }

    fn reload_image(&self, url: &str, busted_url: &str) {
        let mut images = self.images.lock();
        if let Some(slot) = images.iter_mut().find(|u| *u == url) {
            *slot = busted_url.to_string();
        }
        info!(url = %url, busted = %busted_url, "Reloading image");
    }

    fn stylesheet_urls(&self) -> Vec<String> {
        self.stylesheets.lock().clone()
    }

    fn reload_stylesheet(&self, url: &str, busted_url: &str) {
        let mut stylesheets = self.stylesheets.lock();
        if let Some(slot) = stylesheets.iter_mut().find(|u| *u == url) {
            *slot = busted_url.to_string();
        }
        info!(url = %url, busted = %busted_url, "Reloading stylesheet");
    }

    fn reload_page(&self) {
        self.page_reloads.fetch_add(1, Ordering::SeqCst);
        info!("Page reload requested");
    }
}

//! Port for the rendering surface the cache manager forces reloads on.

/// Port over whatever rendering layer displays images and stylesheets.
///
/// The cache manager uses it to force a re-fetch of elements whose URL
/// matched a purge pattern, by reassigning the source with a cache-busting
/// query parameter, and to trigger full page reloads.
pub trait RenderSurfacePort: Send + Sync {
    /// URLs of every image element currently bound to the surface.
    fn image_urls(&self) -> Vec<String>;

    /// Re-fetches one image element, swapping its source for the busted URL.
    fn reload_image(&self, url: &str, busted_url: &str);

    /// URLs of every stylesheet link currently bound to the surface.
    fn stylesheet_urls(&self) -> Vec<String>;

    /// Re-fetches one stylesheet.
    fn reload_stylesheet(&self, url: &str, busted_url: &str);

    /// Forces a hard navigation reload of the whole surface.
    fn reload_page(&self);
}

#[cfg(test)]
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Recording surface for tests.
    #[derive(Default)]
    pub struct MockRenderSurface {
        pub images: Mutex<Vec<String>>,
        pub stylesheets: Mutex<Vec<String>>,
        pub image_reloads: Mutex<Vec<(String, String)>>,
        pub stylesheet_reloads: Mutex<Vec<(String, String)>>,
        pub page_reloads: std::sync::atomic::AtomicUsize,
    }

    impl MockRenderSurface {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_images(urls: &[&str]) -> Self {
            let surface = Self::default();
            *surface.images.lock().unwrap() = urls.iter().map(ToString::to_string).collect();
            surface
        }

        pub fn reload_count(&self) -> usize {
            self.page_reloads.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    impl RenderSurfacePort for MockRenderSurface {
        fn image_urls(&self) -> Vec<String> {
            self.images.lock().unwrap().clone()
        }

        fn reload_image(&self, url: &str, busted_url: &str) {
            self.image_reloads
                .lock()
                .unwrap()
                .push((url.to_string(), busted_url.to_string()));
        }

        fn stylesheet_urls(&self) -> Vec<String> {
            self.stylesheets.lock().unwrap().clone()
        }

        fn reload_stylesheet(&self, url: &str, busted_url: &str) {
            self.stylesheet_reloads
                .lock()
                .unwrap()
                .push((url.to_string(), busted_url.to_string()));
        }

        fn reload_page(&self) {
            self.page_reloads
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }
}

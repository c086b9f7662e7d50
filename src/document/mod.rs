//! Document Module
//!
//! Prepares the images of one document payload for rendering: collects its
//! links, warms the cache, and hands back a getter for the template engine.

mod getter;
mod sizing;

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use crate::cache::ImageCache;
use crate::prefetch::{collect_links, PrefetchScheduler};

pub use getter::{resolve_reference, ImageGetter, ImageSource};
pub use sizing::display_size;

// == Document Images ==
#[derive(Clone)]
pub struct DocumentImages {
    cache: Arc<ImageCache>,
    scheduler: PrefetchScheduler,
    prefetch_enabled: bool,
}

impl DocumentImages {
    pub fn new(cache: Arc<ImageCache>, scheduler: PrefetchScheduler, prefetch_enabled: bool) -> Self {
        Self {
            cache,
            scheduler,
            prefetch_enabled,
        }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    // == Prepare ==
    /// Collects links from `payload`, prefetches them when enabled, and
    /// returns a getter bound to `token`.
    ///
    /// Prefetch failures do not fail preparation; they resurface as errors
    /// from the getter if the template asks for that image.
    pub async fn prepare(&self, payload: &Value, token: Option<&str>) -> ImageGetter {
        let links = collect_links(payload);

        let report = if self.prefetch_enabled && !links.is_empty() {
            Some(self.scheduler.prefetch_all(links.iter().cloned(), token).await)
        } else {
            debug!("skipping prefetch of {} links", links.len());
            None
        };

        ImageGetter::new(
            self.cache.clone(),
            token.map(String::from),
            Handle::current(),
            links,
            report,
        )
    }
}

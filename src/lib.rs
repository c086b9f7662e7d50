//! imgcache - remote image fetch, transform and cache
//!
//! Fetches images referenced by JSON document payloads, shrinks and re-encodes
//! them within bounds, and keeps the results in a layered memory + disk cache
//! with in-flight request sharing and per-host bounded prefetch.

pub mod api;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod models;
pub mod prefetch;
pub mod tasks;
pub mod transform;

pub use api::{create_router, AppState};
pub use cache::{CacheSettings, ImageCache};
pub use config::Config;
pub use document::{display_size, DocumentImages, ImageGetter, ImageSource};
pub use error::{CacheError, FetchError, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use prefetch::{collect_links, PrefetchLimits, PrefetchScheduler};
pub use tasks::spawn_cleanup_task;
pub use transform::{TransformEngine, TransformPolicy};

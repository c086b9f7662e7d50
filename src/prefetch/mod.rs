//! Prefetch Module
//!
//! Link collection from document payloads and bounded cache warming.

mod links;
mod scheduler;

pub use links::{collect_links, is_http_url, LINK_ATTRIBUTE, MAX_DEPTH};
pub use scheduler::{host_of, PrefetchJob, PrefetchLimits, PrefetchReport, PrefetchScheduler};

//! Fetch Module
//!
//! Upstream HTTP access: pooled client, retry classification and backoff.

mod client;
mod retry;

pub use client::{parse_http_url, Fetcher, HttpFetcher, HttpSettings, WarmupReport};
pub use retry::{parse_retry_after, RetryPolicy};

#[cfg(test)]
pub(crate) mod testing;

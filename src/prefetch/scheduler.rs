//! Prefetch Scheduler Module
//!
//! Warms the image cache for a batch of URLs, bounded globally and per host.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};
use url::Url;

use crate::cache::ImageCache;

// == Prefetch Limits ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchLimits {
    /// Loads in flight across all hosts
    pub global_concurrency: usize,
    /// Loads in flight against any single host
    pub host_concurrency: usize,
}

impl Default for PrefetchLimits {
    fn default() -> Self {
        Self {
            global_concurrency: 10,
            host_concurrency: 10,
        }
    }
}

// == Prefetch Job ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchJob {
    pub url: String,
    pub host: String,
}

impl PrefetchJob {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let host = host_of(&url);
        Self { url, host }
    }
}

/// Outcome counts of one prefetch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

// == Prefetch Scheduler ==
#[derive(Clone)]
pub struct PrefetchScheduler {
    cache: Arc<ImageCache>,
    limits: PrefetchLimits,
}

impl PrefetchScheduler {
    /// Limits are floored at 1.
    pub fn new(cache: Arc<ImageCache>, limits: PrefetchLimits) -> Self {
        Self {
            cache,
            limits: PrefetchLimits {
                global_concurrency: limits.global_concurrency.max(1),
                host_concurrency: limits.host_concurrency.max(1),
            },
        }
    }

    pub fn limits(&self) -> PrefetchLimits {
        self.limits
    }

    // == Prefetch All ==
    /// Drives every URL through the cache and returns once all have settled.
    ///
    /// Per-URL failures are logged and counted, never returned; a later
    /// `get_or_fetch` simply retries.
    pub async fn prefetch_all<I>(&self, urls: I, token: Option<&str>) -> PrefetchReport
    where
        I: IntoIterator<Item = String>,
    {
        let started = Instant::now();
        let mut queue: VecDeque<PrefetchJob> = urls.into_iter().map(PrefetchJob::new).collect();
        let mut report = PrefetchReport {
            requested: queue.len(),
            ..PrefetchReport::default()
        };
        if queue.is_empty() {
            return report;
        }

        let mut active_by_host: HashMap<String, usize> = HashMap::new();
        let mut active = FuturesUnordered::new();

        loop {
            while active.len() < self.limits.global_concurrency {
                let Some(job) = self.next_startable(&mut queue, &active_by_host) else {
                    break;
                };
                *active_by_host.entry(job.host.clone()).or_insert(0) += 1;

                let cache = self.cache.clone();
                let token = token.map(String::from);
                active.push(async move {
                    let result = cache.get_or_fetch(&job.url, token.as_deref()).await;
                    (job, result)
                });
            }

            let Some((job, result)) = active.next().await else {
                break;
            };
            if let Some(count) = active_by_host.get_mut(&job.host) {
                *count = count.saturating_sub(1);
            }
            match result {
                Ok(_) => report.succeeded += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("prefetch of {} failed: {}", job.url, e);
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "prefetch urls={} ok={} failed={} conc={} hostConc={} took={:?}",
            report.requested,
            report.succeeded,
            report.failed,
            self.limits.global_concurrency,
            self.limits.host_concurrency,
            report.elapsed
        );
        report
    }

    /// Removes the first queued job whose host has a free slot.
    fn next_startable(
        &self,
        queue: &mut VecDeque<PrefetchJob>,
        active_by_host: &HashMap<String, usize>,
    ) -> Option<PrefetchJob> {
        let index = queue.iter().position(|job| {
            active_by_host.get(&job.host).copied().unwrap_or(0) < self.limits.host_concurrency
        })?;
        queue.remove(index)
    }
}

// == Host Of ==
/// `host[:port]` of a URL, or `unknown` when it does not parse.
pub fn host_of(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return "unknown".to_string();
    };
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => "unknown".to_string(),
    }
}

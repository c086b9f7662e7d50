//! Response DTOs for the image cache API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::time::Duration;

use serde::Serialize;

use crate::cache::CacheStats;
use crate::fetch::WarmupReport;
use crate::prefetch::PrefetchReport;

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub coalesced: u64,
    pub misses: u64,
    pub upstream_fetches: u64,
    pub fetch_failures: u64,
    pub evictions: u64,
    /// Entries currently in memory, ready or pending
    pub total_entries: usize,
    pub in_flight: usize,
    /// Share of lookups answered without going upstream
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            memory_hits: stats.memory_hits,
            disk_hits: stats.disk_hits,
            coalesced: stats.coalesced,
            misses: stats.misses,
            upstream_fetches: stats.upstream_fetches,
            fetch_failures: stats.fetch_failures,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            in_flight: stats.in_flight,
        }
    }
}

/// Response body for POST /prefetch
#[derive(Debug, Clone, Serialize)]
pub struct PrefetchResponse {
    /// Distinct image links found in the payload
    pub links: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Links left for render time because prefetch is disabled
    pub skipped: usize,
    pub took_ms: u64,
}

impl PrefetchResponse {
    pub fn new(links: usize, report: Option<PrefetchReport>, took: Duration) -> Self {
        let (succeeded, failed, skipped) = match report {
            Some(report) => (report.succeeded, report.failed, 0),
            None => (0, 0, links),
        };
        Self {
            links,
            succeeded,
            failed,
            skipped,
            took_ms: millis(took),
        }
    }
}

/// Response body for GET /warmup
#[derive(Debug, Clone, Serialize)]
pub struct WarmupResponse {
    pub ok: usize,
    pub total: usize,
    pub took_ms: u64,
}

impl From<WarmupReport> for WarmupResponse {
    fn from(report: WarmupReport) -> Self {
        Self {
            ok: report.ok,
            total: report.total,
            took_ms: millis(report.took),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

//! Cache Statistics Module
//!
//! Counters for memory hits, coalesced waits, disk hits and upstream traffic.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Served from fresh memory data
    pub memory_hits: u64,
    /// Joined a load already in flight
    pub coalesced: u64,
    /// Started a new load
    pub misses: u64,
    /// Loads satisfied by the disk cache
    pub disk_hits: u64,
    /// Loads that went upstream and succeeded
    pub upstream_fetches: u64,
    /// Loads that failed (fetch error or cancellation)
    pub fetch_failures: u64,
    /// Entries dropped for capacity
    pub evictions: u64,
    /// Entries currently held, ready or pending
    pub total_entries: usize,
    /// Entries currently pending
    pub in_flight: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of lookups answered without going upstream.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.memory_hits + self.coalesced + self.misses;
        if lookups == 0 {
            0.0
        } else {
            (self.memory_hits + self.coalesced + self.disk_hits) as f64 / lookups as f64
        }
    }

    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    pub fn record_upstream_fetch(&mut self) {
        self.upstream_fetches += 1;
    }

    pub fn record_failure(&mut self) {
        self.fetch_failures += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

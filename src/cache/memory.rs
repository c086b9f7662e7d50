//! Memory Cache Module
//!
//! HashMap storage with LRU tracking, TTL expiry and in-flight load slots.
//! Callers serialize access behind one lock; every method is synchronous.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::cache::entry::{CacheEntry, LoadSource, Loaded, SharedLoad, Slot};
use crate::cache::{CacheStats, LruTracker};

// == Lookup ==
/// Result of consulting the memory layer.
pub enum Lookup {
    /// Fresh data
    Hit(Bytes),
    /// Someone is already loading this key
    InFlight { generation: u64, load: SharedLoad },
    /// Nothing usable; the caller should start a load
    Miss,
}

// == Memory Cache ==
#[derive(Debug)]
pub struct MemoryCache {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    stats: CacheStats,
    max_entries: usize,
    ttl: Duration,
    next_generation: u64,
}

impl MemoryCache {
    /// `max_entries` is floored at 1.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries: max_entries.max(1),
            ttl,
            next_generation: 0,
        }
    }

    // == Lookup ==
    /// Consults the map. Expired data is dropped and reported as a miss.
    pub fn lookup(&mut self, key: &str) -> Lookup {
        let now = Instant::now();
        let Some(entry) = self.entries.get(key) else {
            self.stats.record_miss();
            return Lookup::Miss;
        };

        if entry.is_expired(now) {
            self.remove(key);
            self.stats.record_miss();
            return Lookup::Miss;
        }

        match &entry.slot {
            Slot::Ready(bytes) => {
                let bytes = bytes.clone();
                self.lru.touch(key);
                self.stats.record_memory_hit();
                Lookup::Hit(bytes)
            }
            Slot::Pending { generation, load } => {
                let found = Lookup::InFlight {
                    generation: *generation,
                    load: load.clone(),
                };
                self.stats.record_coalesced();
                found
            }
        }
    }

    // == Begin ==
    /// Installs an in-flight load for `key` and returns its generation.
    pub fn begin(&mut self, key: &str, load: SharedLoad) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.insert(
            key.to_string(),
            CacheEntry::pending(key, generation, load, self.ttl),
        );
        self.lru.touch(key);
        self.evict_if_needed();
        generation
    }

    // == Complete ==
    /// Replaces the pending slot of `generation` with the loaded bytes.
    ///
    /// Returns false when another waiter already settled it or a newer load took over.
    pub fn complete(&mut self, key: &str, generation: u64, loaded: &Loaded) -> bool {
        let settles = self
            .entries
            .get(key)
            .map_or(true, |entry| entry.is_pending_generation(generation));
        if !settles {
            return false;
        }

        match loaded.source {
            LoadSource::Disk => self.stats.record_disk_hit(),
            LoadSource::Upstream => self.stats.record_upstream_fetch(),
        }
        self.store(key, loaded.bytes.clone());
        true
    }

    // == Abandon ==
    /// Clears the pending slot of a failed load so the next caller retries.
    pub fn abandon(&mut self, key: &str, generation: u64) -> bool {
        let owned = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_pending_generation(generation));
        if owned {
            self.remove(key);
            self.stats.record_failure();
        }
        owned
    }

    // == Insert ==
    /// Stores ready bytes with a fresh TTL, replacing whatever was there.
    pub fn insert(&mut self, key: &str, bytes: Bytes) {
        self.store(key, bytes);
    }

    // == Cleanup Expired ==
    /// Removes expired ready entries. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.in_flight = self.entries.values().filter(|e| e.is_pending()).count();
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn store(&mut self, key: &str, bytes: Bytes) {
        self.entries
            .insert(key.to_string(), CacheEntry::ready(key, bytes, self.ttl));
        self.lru.touch(key);
        self.evict_if_needed();
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.lru.remove(key);
    }

    /// Evicts least recently used ready entries until within capacity.
    ///
    /// Pending entries are never evicted; while loads are in flight the map
    /// may hold more than `max_entries` until they settle.
    fn evict_if_needed(&mut self) {
        while self.entries.len() > self.max_entries {
            let entries = &self.entries;
            let victim = self
                .lru
                .oldest_first()
                .find(|key| entries.get(*key).map_or(true, |entry| !entry.is_pending()))
                .map(String::from);
            match victim {
                Some(key) => {
                    self.remove(&key);
                    self.stats.record_eviction();
                }
                None => break,
            }
        }
    }
}

//! Cache Module
//!
//! Layered image cache: memory with TTL, LRU eviction and in-flight sharing,
//! backed by a TTL-checked disk store.

mod disk;
mod entry;
mod layered;
mod lru;
mod memory;
mod stats;


// Re-export public types
pub use disk::{key_for, DiskCache};
pub use entry::{CacheEntry, LoadSource, Loaded, SharedLoad, Slot};
pub use layered::{CacheSettings, ImageCache};
pub use lru::LruTracker;
pub use memory::{Lookup, MemoryCache};
pub use stats::CacheStats;

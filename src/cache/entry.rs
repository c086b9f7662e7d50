//! Cache Entry Module
//!
//! A memory slot holds either finished bytes or the shared in-flight load.

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::{BoxFuture, Shared};

use crate::error::Result;

// == Load Source ==
/// Where a finished load got its bytes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Disk,
    Upstream,
}

/// Output of a load, shared by every coalesced waiter.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub bytes: Bytes,
    pub source: LoadSource,
}

/// One upstream load that any number of callers can await.
pub type SharedLoad = Shared<BoxFuture<'static, Result<Loaded>>>;

// == Slot ==
/// Exactly one of finished data or an in-flight load.
#[derive(Clone)]
pub enum Slot {
    Ready(Bytes),
    Pending { generation: u64, load: SharedLoad },
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Ready(bytes) => f.debug_tuple("Ready").field(&bytes.len()).finish(),
            Slot::Pending { generation, .. } => f
                .debug_struct("Pending")
                .field("generation", generation)
                .finish_non_exhaustive(),
        }
    }
}

// == Cache Entry ==
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Source URL
    pub key: String,
    /// When ready data stops being served
    pub expires_at: Instant,
    pub slot: Slot,
}

impl CacheEntry {
    pub fn ready(key: impl Into<String>, bytes: Bytes, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            expires_at: Instant::now() + ttl,
            slot: Slot::Ready(bytes),
        }
    }

    pub fn pending(key: impl Into<String>, generation: u64, load: SharedLoad, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            expires_at: Instant::now() + ttl,
            slot: Slot::Pending { generation, load },
        }
    }

    // == Is Expired ==
    /// Ready data expires at `expires_at`; an in-flight load never does.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.slot {
            Slot::Ready(_) => now >= self.expires_at,
            Slot::Pending { .. } => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.slot, Slot::Pending { .. })
    }

    /// Pending load with this exact generation.
    pub fn is_pending_generation(&self, generation: u64) -> bool {
        matches!(self.slot, Slot::Pending { generation: g, .. } if g == generation)
    }

    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::thread::sleep;

    fn resolved_load() -> SharedLoad {
        futures::future::ready(Ok(Loaded {
            bytes: Bytes::from_static(b"x"),
            source: LoadSource::Upstream,
        }))
        .boxed()
        .shared()
    }

    #[test]
    fn test_ready_entry_expires() {
        let entry = CacheEntry::ready("k", Bytes::from_static(b"v"), Duration::from_millis(50));
        assert!(!entry.is_expired(Instant::now()));
        assert!(entry.ttl_remaining() <= Duration::from_millis(50));

        sleep(Duration::from_millis(70));
        assert!(entry.is_expired(Instant::now()));
        assert_eq!(entry.ttl_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_pending_entry_never_expires() {
        let entry = CacheEntry::pending("k", 7, resolved_load(), Duration::ZERO);
        assert!(entry.is_pending());
        assert!(entry.is_pending_generation(7));
        assert!(!entry.is_pending_generation(8));
        assert!(!entry.is_expired(Instant::now() + Duration::from_secs(3600)));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = CacheEntry {
            key: "k".to_string(),
            expires_at: now,
            slot: Slot::Ready(Bytes::new()),
        };
        assert!(entry.is_expired(now), "Entry should be expired at boundary");
    }
}

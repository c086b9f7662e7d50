//! Memory Purge Task
//!
//! Background task that periodically drops expired memory entries so idle
//! images do not hold memory until the next lookup touches them.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ImageCache;

/// Spawns a background task that purges expired memory entries every `interval`.
///
/// In-flight loads are never purged. The disk layer is untouched; stale files
/// are only ignored on read.
///
/// Returns the task handle so shutdown can abort it.
///
/// # Example
/// ```ignore
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<ImageCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting memory purge task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired().await;
            if removed > 0 {
                info!("memory purge: removed {} expired entries", removed);
            } else {
                debug!("memory purge: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSettings;
    use crate::fetch::testing::ScriptedFetcher;
    use crate::transform::TransformEngine;
    use tempfile::{tempdir, TempDir};

    fn cache_with_ttl(ttl: Duration, dir: &TempDir) -> Arc<ImageCache> {
        Arc::new(ImageCache::new(
            CacheSettings {
                max_entries: 100,
                ttl,
                disk_dir: dir.path().to_path_buf(),
                transform_enabled: false,
            },
            Arc::new(ScriptedFetcher::new(&b"pixels"[..])),
            TransformEngine::default(),
        ))
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let dir = tempdir().unwrap();
        let cache = cache_with_ttl(Duration::from_millis(50), &dir);
        cache.get_or_fetch("https://h/expire-soon.png", None).await.unwrap();

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(cache.is_empty().await, "Expired entry should have been purged");
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let dir = tempdir().unwrap();
        let cache = cache_with_ttl(Duration::from_secs(3600), &dir);
        cache.get_or_fetch("https://h/long-lived.png", None).await.unwrap();

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.len().await, 1, "Valid entry should not be removed");
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let dir = tempdir().unwrap();
        let cache = cache_with_ttl(Duration::from_secs(60), &dir);

        let handle = spawn_cleanup_task(cache, Duration::from_secs(1));
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}

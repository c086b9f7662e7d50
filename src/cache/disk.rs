//! Disk Cache Module
//!
//! Transformed bytes stored verbatim under `<dir>/<sha256(url)>.bin`.
//! Freshness is the file's modification time; stale files are ignored, not deleted.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

// == Disk Cache ==
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds (or would hold) the bytes for `url`.
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", key_for(url)))
    }

    // == Read ==
    /// Returns the cached bytes when the file exists and is younger than the TTL.
    pub async fn read(&self, url: &str) -> Option<Bytes> {
        let path = self.path_for(url);
        let metadata = fs::metadata(&path).await.ok()?;
        let modified = metadata.modified().ok()?;

        // A timestamp in the future counts as brand new.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.ttl {
            debug!("disk cache entry {} is stale ({:?} old)", path.display(), age);
            return None;
        }

        fs::read(&path).await.ok().map(Bytes::from)
    }

    // == Write ==
    /// Replaces the file for `url` in one step (temp file + rename).
    pub async fn write(&self, url: &str, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(url);
        let staging = self
            .dir
            .join(format!("{}.{:016x}.tmp", key_for(url), rand::random::<u64>()));

        fs::write(&staging, bytes).await?;
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e);
        }
        Ok(())
    }
}

// == Key For ==
/// Hex SHA-256 of the URL.
pub fn key_for(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

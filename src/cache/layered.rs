//! Layered Cache Module
//!
//! Memory (TTL + LRU + in-flight sharing) in front of disk (TTL) in front of
//! fetch + transform. Concurrent callers for one URL share a single load.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::entry::{LoadSource, Loaded, SharedLoad};
use crate::cache::memory::{Lookup, MemoryCache};
use crate::cache::{CacheStats, DiskCache};
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::transform::TransformEngine;

// == Cache Settings ==
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Memory entries kept before LRU eviction
    pub max_entries: usize,
    /// Freshness window for both layers
    pub ttl: Duration,
    pub disk_dir: PathBuf,
    /// Run fetched bytes through the transform engine
    pub transform_enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 2000,
            ttl: Duration::from_secs(600),
            disk_dir: std::env::temp_dir().join("img-cache"),
            transform_enabled: true,
        }
    }
}

// == Image Cache ==
/// Process-wide cache of transformed image bytes keyed by URL.
pub struct ImageCache {
    memory: Mutex<MemoryCache>,
    disk: Arc<DiskCache>,
    fetcher: Arc<dyn Fetcher>,
    engine: Option<Arc<TransformEngine>>,
}

impl ImageCache {
    pub fn new(settings: CacheSettings, fetcher: Arc<dyn Fetcher>, engine: TransformEngine) -> Self {
        Self {
            memory: Mutex::new(MemoryCache::new(settings.max_entries, settings.ttl)),
            disk: Arc::new(DiskCache::new(settings.disk_dir, settings.ttl)),
            fetcher,
            engine: settings.transform_enabled.then(|| Arc::new(engine)),
        }
    }

    /// Builds the cache over a pooled [`HttpFetcher`].
    pub fn from_config(config: &Config) -> Result<(Self, Arc<HttpFetcher>)> {
        let http = Arc::new(HttpFetcher::new(config.http_settings(), config.retry_policy())?);
        let cache = Self::new(
            config.cache_settings(),
            http.clone(),
            TransformEngine::new(config.transform_policy()),
        );
        Ok((cache, http))
    }

    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    // == Get Or Fetch ==
    /// Returns transformed bytes for `url`, loading them at most once across concurrent callers.
    pub async fn get_or_fetch(&self, url: &str, token: Option<&str>) -> Result<Bytes> {
        self.get_or_fetch_cancellable(url, token, CancellationToken::new())
            .await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch); cancelling `cancel` stops a load this call started.
    ///
    /// Callers that join someone else's load inherit that caller's cancellation.
    pub async fn get_or_fetch_cancellable(
        &self,
        url: &str,
        token: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Bytes> {
        // Lookup and pending install happen under one lock acquisition.
        let (generation, load) = {
            let mut memory = self.memory.lock().await;
            match memory.lookup(url) {
                Lookup::Hit(bytes) => return Ok(bytes),
                Lookup::InFlight { generation, load } => {
                    debug!("joining in-flight load for {}", url);
                    (generation, load)
                }
                Lookup::Miss => {
                    let load = self.start_load(url, token, cancel);
                    let generation = memory.begin(url, load.clone());
                    (generation, load)
                }
            }
        };

        let outcome = load.await;

        let mut memory = self.memory.lock().await;
        match outcome {
            Ok(loaded) => {
                memory.complete(url, generation, &loaded);
                Ok(loaded.bytes)
            }
            Err(err) => {
                if memory.abandon(url, generation) {
                    debug!("load for {} failed: {}", url, err);
                }
                Err(err)
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.memory.lock().await.stats()
    }

    pub async fn len(&self) -> usize {
        self.memory.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memory.lock().await.is_empty()
    }

    /// Drops expired memory entries. Returns how many went.
    pub async fn purge_expired(&self) -> usize {
        self.memory.lock().await.cleanup_expired()
    }

    fn start_load(&self, url: &str, token: Option<&str>, cancel: CancellationToken) -> SharedLoad {
        load(
            url.to_string(),
            token.map(String::from),
            cancel,
            self.disk.clone(),
            self.fetcher.clone(),
            self.engine.clone(),
        )
        .boxed()
        .shared()
    }
}

// == Load ==
/// Disk, then upstream + transform + disk write.
async fn load(
    url: String,
    token: Option<String>,
    cancel: CancellationToken,
    disk: Arc<DiskCache>,
    fetcher: Arc<dyn Fetcher>,
    engine: Option<Arc<TransformEngine>>,
) -> Result<Loaded> {
    if let Some(bytes) = disk.read(&url).await {
        debug!("disk cache hit for {}", url);
        return Ok(Loaded {
            bytes,
            source: LoadSource::Disk,
        });
    }

    let raw = fetcher.fetch(&url, token.as_deref(), &cancel).await?;
    let bytes = match engine {
        Some(engine) => engine.transform(raw).await,
        None => raw,
    };

    if let Err(e) = disk.write(&url, &bytes).await {
        warn!("could not write disk cache for {}: {}", url, e);
    }

    Ok(Loaded {
        bytes,
        source: LoadSource::Upstream,
    })
}

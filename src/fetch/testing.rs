//! In-process [`Fetcher`] for tests: counts calls and per-host concurrency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::FetchError;
use crate::fetch::Fetcher;

#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    body: Bytes,
    delay: Duration,
    fail_status: Option<u16>,
    calls: AtomicUsize,
    per_url: Mutex<HashMap<String, usize>>,
    active: Mutex<HashMap<String, usize>>,
    peak: Mutex<HashMap<String, usize>>,
    last_token: Mutex<Option<String>>,
}

impl ScriptedFetcher {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.per_url.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Token passed to the most recent fetch.
    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().unwrap().clone()
    }

    /// Highest number of simultaneous fetches seen against `host`.
    pub fn peak_for(&self, host: &str) -> usize {
        self.peak.lock().unwrap().get(host).copied().unwrap_or(0)
    }

    fn enter(&self, host: &str) {
        let mut active = self.active.lock().unwrap();
        let now = active.entry(host.to_string()).or_insert(0);
        *now += 1;
        let mut peak = self.peak.lock().unwrap();
        let best = peak.entry(host.to_string()).or_insert(0);
        *best = (*best).max(*now);
    }

    fn leave(&self, host: &str) {
        if let Some(now) = self.active.lock().unwrap().get_mut(host) {
            *now -= 1;
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.per_url.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        *self.last_token.lock().unwrap() = token.map(String::from);

        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .unwrap_or_default();
        self.enter(&host);
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.delay) => false,
        };
        self.leave(&host);

        if cancelled {
            return Err(FetchError::Cancelled { url: url.to_string() });
        }
        match self.fail_status {
            Some(status) => Err(FetchError::Status {
                url: url.to_string(),
                status,
                retry_after: None,
            }),
            None => Ok(self.body.clone()),
        }
    }
}

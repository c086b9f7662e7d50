//! Fetch Client Module
//!
//! HTTP GET with a shared keep-alive pool, bounded retries and backoff.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::Client;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::error::{CacheError, FetchError, TransportKind};
use crate::fetch::retry::{parse_retry_after, RetryPolicy};

// == Fetcher Trait ==
/// Source of raw image bytes for the cache.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, retrying transient failures. Stops early once `cancel` fires.
    async fn fetch(
        &self,
        url: &str,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError>;
}

// == HTTP Settings ==
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Whole-request timeout
    pub timeout: Duration,
    /// Connections open at once per upstream host
    pub max_sockets: usize,
    /// Bind outbound sockets to an IPv4 address
    pub force_ipv4: bool,
    /// Authorization scheme, e.g. `Bearer`
    pub auth_scheme: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            max_sockets: 16,
            force_ipv4: false,
            auth_scheme: "Bearer".to_string(),
        }
    }
}

/// Result of a connection warmup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupReport {
    pub ok: usize,
    pub total: usize,
    pub took: Duration,
}

// == HTTP Fetcher ==
/// [`Fetcher`] over one pooled reqwest client, shared by every call.
///
/// Requests to one host (`host:port`) never exceed `max_sockets` at a time,
/// however many callers share the fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
    auth_scheme: String,
    max_sockets: usize,
    sockets: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl HttpFetcher {
    pub fn new(settings: HttpSettings, retry: RetryPolicy) -> Result<Self, CacheError> {
        let max_sockets = settings.max_sockets.max(1);
        let mut builder = Client::builder()
            .timeout(settings.timeout)
            .pool_max_idle_per_host(max_sockets)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(60));
        if settings.force_ipv4 {
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }

        let client = builder
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry,
            auth_scheme: settings.auth_scheme,
            max_sockets,
            sockets: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // == Warm ==
    /// HEADs each URL through the pool so DNS, TLS and keep-alive are ready.
    ///
    /// Any response counts as warm; failures are ignored.
    pub async fn warm(&self, urls: &[String]) -> WarmupReport {
        let started = Instant::now();
        let results = join_all(urls.iter().map(|url| {
            self.client
                .head(url.as_str())
                .header("cache-control", "no-store")
                .send()
        }))
        .await;

        let ok = results.iter().filter(|r| r.is_ok()).count();
        debug!("warmed {}/{} upstream hosts", ok, urls.len());
        WarmupReport {
            ok,
            total: urls.len(),
            took: started.elapsed(),
        }
    }

    /// Waits for a connection slot on the URL's host.
    async fn socket_permit(&self, url: &Url) -> Option<OwnedSemaphorePermit> {
        let host = match (url.host_str(), url.port_or_known_default()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        let semaphore = {
            let mut sockets = self.sockets.lock().await;
            sockets
                .entry(host)
                .or_insert_with(|| Arc::new(Semaphore::new(self.max_sockets)))
                .clone()
        };
        // The semaphore is never closed, so acquisition only fails if that changes.
        semaphore.acquire_owned().await.ok()
    }

    async fn attempt(&self, url: &Url, token: Option<&str>) -> Result<Bytes, FetchError> {
        let _permit = self.socket_permit(url).await;
        let mut request = self.client.get(url.clone());
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            request = request.header(AUTHORIZATION, format!("{} {}", self.auth_scheme, token));
        }

        let response = request.send().await.map_err(|e| classify(url.as_str(), &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                retry_after: response.headers().get(RETRY_AFTER).and_then(parse_retry_after),
            });
        }

        response.bytes().await.map_err(|e| classify(url.as_str(), &e))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let parsed = parse_http_url(url)?;
        let attempts = self.retry.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled { url: url.to_string() }),
                outcome = self.attempt(&parsed, token) => outcome,
            };

            let err = match outcome {
                Ok(bytes) => {
                    debug!(
                        "fetched {} ({}B in {:?}, try {}/{})",
                        short(url),
                        bytes.len(),
                        started.elapsed(),
                        attempt,
                        attempts
                    );
                    return Ok(bytes);
                }
                Err(err) => err,
            };

            debug!(
                "fetch {} failed after {:?} (try {}/{}): {}",
                short(url),
                started.elapsed(),
                attempt,
                attempts,
                err
            );
            if !err.is_retriable() {
                return Err(err);
            }
            if attempt >= attempts {
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts,
                    last: Box::new(err),
                });
            }

            let wait = self.retry.delay_for(attempt, err.retry_after());
            warn!("retrying {} in {:?}: {}", short(url), wait, err);
            tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled { url: url.to_string() }),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

// == Helpers ==
/// Parses `raw` and insists on an http(s) scheme.
pub fn parse_http_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", other),
        }),
    }
}

/// `host/last-segment`, for log lines.
fn short(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => {
            let tail = url
                .path_segments()
                .and_then(|segments| segments.last())
                .unwrap_or("");
            format!("{}/{}", url.host_str().unwrap_or(""), tail)
        }
        Err(_) => raw.to_string(),
    }
}

fn classify(url: &str, err: &reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        TransportKind::Timeout
    } else {
        transport_kind(err)
    };
    FetchError::Transport {
        url: url.to_string(),
        kind,
        message: error_chain(err),
    }
}

/// The error and all of its causes, joined with `: `.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        let text = e.to_string();
        if !parts.iter().any(|seen| seen.contains(&text)) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}

/// Digs through the error chain for io/DNS causes.
///
/// Only a temporary resolver failure counts as `Dns`; an unknown host is `Other`.
fn transport_kind(err: &(dyn StdError + 'static)) -> TransportKind {
    let mut lookup_failed = false;
    let mut current = Some(err);
    while let Some(e) = current {
        let text = e.to_string();
        if is_temporary_lookup_failure(&text) {
            return TransportKind::Dns;
        }
        if text.contains("dns error") || text.contains("failed to lookup address") {
            lookup_failed = true;
        }
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::TimedOut if lookup_failed => return TransportKind::Dns,
                io::ErrorKind::TimedOut => return TransportKind::Timeout,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
                    if !lookup_failed =>
                {
                    return TransportKind::ConnectionReset
                }
                _ => {}
            }
        }
        if !lookup_failed && text.contains("connection closed before message completed") {
            return TransportKind::ConnectionReset;
        }
        current = e.source();
    }
    TransportKind::Other
}

fn is_temporary_lookup_failure(text: &str) -> bool {
    text.to_ascii_lowercase()
        .contains("temporary failure in name resolution")
}

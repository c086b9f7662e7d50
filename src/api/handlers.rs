//! API Handlers
//!
//! HTTP request handlers for each image cache endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::ImageCache;
use crate::config::Config;
use crate::document::DocumentImages;
use crate::error::{CacheError, Result};
use crate::fetch::HttpFetcher;
use crate::models::{
    upstream_token, HealthResponse, ImageQuery, PrefetchResponse, StatsResponse, WarmupResponse,
};
use crate::prefetch::PrefetchScheduler;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide image cache
    pub cache: Arc<ImageCache>,
    /// Link collection + prefetch over the same cache
    pub documents: DocumentImages,
    /// Pooled client, kept for connection warmup
    pub http: Arc<HttpFetcher>,
    pub warm_urls: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(documents: DocumentImages, http: Arc<HttpFetcher>, warm_urls: Vec<String>) -> Self {
        Self {
            cache: documents.cache().clone(),
            documents,
            http,
            warm_urls: Arc::new(warm_urls),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Fails only if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (cache, http) = ImageCache::from_config(config)?;
        let cache = Arc::new(cache);
        let scheduler = PrefetchScheduler::new(cache.clone(), config.prefetch_limits());
        let documents = DocumentImages::new(cache, scheduler, config.prefetch_enabled);
        Ok(Self::new(documents, http, config.warm_urls.clone()))
    }
}

/// Handler for POST /prefetch
///
/// Collects the image links of a document payload and warms the cache with them.
pub async fn prefetch_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Json<PrefetchResponse> {
    let started = Instant::now();
    let getter = state
        .documents
        .prepare(&payload, upstream_token(&headers))
        .await;

    Json(PrefetchResponse::new(
        getter.links().len(),
        getter.report(),
        started.elapsed(),
    ))
}

/// Handler for GET /image?url=
///
/// Returns the cached (transformed) bytes for one image.
pub async fn image_handler(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    if let Some(error_msg) = query.validate() {
        return Err(CacheError::InvalidReference(error_msg));
    }

    let bytes = state
        .cache
        .get_or_fetch(&query.url, upstream_token(&headers))
        .await?;

    Ok(([(header::CONTENT_TYPE, content_type_of(&bytes))], bytes).into_response())
}

/// Handler for GET /warmup
///
/// Pre-connects to the configured upstream hosts.
pub async fn warmup_handler(State(state): State<AppState>) -> Json<WarmupResponse> {
    let report = state.http.warm(&state.warm_urls).await;
    info!("warmup ok={}/{} took={:?}", report.ok, report.total, report.took);
    Json(WarmupResponse::from(report))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// MIME type sniffed from the leading bytes.
fn content_type_of(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

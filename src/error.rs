//! Error types for the image cache
//!
//! Provides unified error handling using thiserror.

use std::fmt;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Transport Kind ==
/// Classification of a failure below the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Peer reset or aborted the connection
    ConnectionReset,
    /// Connect or read timed out
    Timeout,
    /// Name resolution failed (treated as temporary)
    Dns,
    /// Any other connect/body/protocol failure
    Other,
}

impl TransportKind {
    /// Whether a failure of this kind is worth another attempt.
    pub fn is_retriable(self) -> bool {
        !matches!(self, TransportKind::Other)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            TransportKind::ConnectionReset => "ECONNRESET",
            TransportKind::Timeout => "ETIMEDOUT",
            TransportKind::Dns => "EAI_AGAIN",
            TransportKind::Other => "EOTHER",
        };
        f.write_str(code)
    }
}

// == Fetch Error ==
/// Failure of a single upstream fetch, classified for the retry loop.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// URL did not parse or is not http(s)
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Upstream answered with a non-2xx status
    #[error("upstream returned {status} for {url}")]
    Status {
        url: String,
        status: u16,
        retry_after: Option<Duration>,
    },

    /// Connection, timeout or DNS failure
    #[error("transport error ({kind}) fetching {url}: {message}")]
    Transport {
        url: String,
        kind: TransportKind,
        message: String,
    },

    /// Caller cancelled the fetch
    #[error("fetch of {url} cancelled")]
    Cancelled { url: String },

    /// Every attempt failed with a retriable error
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// 429, 5xx and reset/timeout/DNS transport failures are retriable.
    pub fn is_retriable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            FetchError::Transport { kind, .. } => kind.is_retriable(),
            _ => false,
        }
    }

    /// HTTP status of the (last) failure, if there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Server supplied backoff hint.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Cancelled { url }
            | FetchError::Exhausted { url, .. } => url,
        }
    }
}

// == Transform Error ==
/// Reasons a transform was skipped. Never surfaced past the engine.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("could not read image metadata: {0}")]
    Probe(String),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("re-encode failed: {0}")]
    Encode(String),
}

// == Cache Error ==
/// Unified error type for cache lookups.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Upstream fetch failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Image reference is not an http(s) URL
    #[error("Invalid image reference: {0}")]
    InvalidReference(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidReference(_) => StatusCode::BAD_REQUEST,
            CacheError::Fetch(FetchError::InvalidUrl { .. }) => StatusCode::BAD_REQUEST,
            CacheError::Fetch(_) => StatusCode::BAD_GATEWAY,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the image cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> FetchError {
        FetchError::Status {
            url: "https://h/a.png".to_string(),
            status: code,
            retry_after: None,
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(status(429).is_retriable());
        assert!(status(500).is_retriable());
        assert!(status(503).is_retriable());
        assert!(status(599).is_retriable());
        assert!(!status(404).is_retriable());
        assert!(!status(401).is_retriable());
        assert!(!status(400).is_retriable());
    }

    #[test]
    fn test_transport_classification() {
        let err = |kind| FetchError::Transport {
            url: "u".to_string(),
            kind,
            message: String::new(),
        };
        assert!(err(TransportKind::ConnectionReset).is_retriable());
        assert!(err(TransportKind::Timeout).is_retriable());
        assert!(err(TransportKind::Dns).is_retriable());
        assert!(!err(TransportKind::Other).is_retriable());
    }

    #[test]
    fn test_exhausted_carries_last_status() {
        let err = FetchError::Exhausted {
            url: "https://h/a.png".to_string(),
            attempts: 4,
            last: Box::new(status(503)),
        };
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.url(), "https://h/a.png");
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_cache_error_status_codes() {
        let resp = CacheError::InvalidReference("ftp://x".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = CacheError::Fetch(status(404)).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}

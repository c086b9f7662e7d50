//! Request DTOs for the image cache API
//!
//! Defines the query strings and headers accepted by the HTTP endpoints.

use axum::http::HeaderMap;
use serde::Deserialize;

use crate::prefetch::is_http_url;

/// Header carrying the upstream auth token for a request.
pub const UPSTREAM_TOKEN_HEADER: &str = "x-upstream-token";

/// Query string for GET /image
#[derive(Debug, Clone, Deserialize)]
pub struct ImageQuery {
    /// Absolute `http(s)` URL of the image
    pub url: String,
}

impl ImageQuery {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.url.trim().is_empty() {
            return Some("url cannot be empty".to_string());
        }
        if !is_http_url(&self.url) {
            return Some(format!("url must be http(s): {}", self.url));
        }
        None
    }
}

/// Upstream token from the request headers, if present and non-empty.
pub fn upstream_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(UPSTREAM_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_image_query_deserialize() {
        let query: ImageQuery = serde_json::from_str(r#"{"url": "https://h/a.png"}"#).unwrap();
        assert_eq!(query.url, "https://h/a.png");
        assert!(query.validate().is_none());
    }

    #[test]
    fn test_validate_rejects_empty_and_non_http() {
        let empty = ImageQuery { url: "  ".to_string() };
        assert!(empty.validate().is_some());

        let ftp = ImageQuery { url: "ftp://h/a.png".to_string() };
        assert!(ftp.validate().unwrap().contains("http(s)"));
    }

    #[test]
    fn test_upstream_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(upstream_token(&headers), None);

        headers.insert(UPSTREAM_TOKEN_HEADER, HeaderValue::from_static("  "));
        assert_eq!(upstream_token(&headers), None);

        headers.insert(UPSTREAM_TOKEN_HEADER, HeaderValue::from_static("abc123"));
        assert_eq!(upstream_token(&headers), Some("abc123"));
    }
}

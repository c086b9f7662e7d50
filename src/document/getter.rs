//! Image Getter
//!
//! The per-document handle a template engine uses to pull image bytes.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::runtime::Handle;

use crate::cache::ImageCache;
use crate::error::{CacheError, Result};
use crate::prefetch::{is_http_url, PrefetchReport, LINK_ATTRIBUTE};

/// Keys checked, in order, when an image reference is an object.
const REFERENCE_KEYS: [&str; 2] = [LINK_ATTRIBUTE, "url"];

// == Image Source ==
/// Bytes for an image URL, fetched with whatever credentials the source was bound to.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn image(&self, url: &str) -> Result<Bytes>;
}

// == Image Getter ==
pub struct ImageGetter {
    source: Arc<ImageCache>,
    token: Option<String>,
    handle: Handle,
    links: HashSet<String>,
    report: Option<PrefetchReport>,
}

impl ImageGetter {
    pub(crate) fn new(
        source: Arc<ImageCache>,
        token: Option<String>,
        handle: Handle,
        links: HashSet<String>,
        report: Option<PrefetchReport>,
    ) -> Self {
        Self {
            source,
            token,
            handle,
            links,
            report,
        }
    }

    /// Links found in the document payload.
    pub fn links(&self) -> &HashSet<String> {
        &self.links
    }

    /// Outcome of the prefetch pass; `None` when prefetch was skipped.
    pub fn report(&self) -> Option<PrefetchReport> {
        self.report
    }

    // == Get ==
    /// Bytes for a reference: a URL string or an object carrying `link` or `url`.
    pub async fn get(&self, reference: &Value) -> Result<Bytes> {
        let url = resolve_reference(reference)?;
        self.source.get_or_fetch(&url, self.token.as_deref()).await
    }

    /// Blocking variant of [`get`](Self::get) for synchronous template engines.
    ///
    /// Must be called off the async workers, e.g. from `spawn_blocking`;
    /// blocking inside a runtime worker panics.
    pub fn get_blocking(&self, reference: &Value) -> Result<Bytes> {
        self.handle.block_on(self.get(reference))
    }
}

#[async_trait]
impl ImageSource for ImageGetter {
    async fn image(&self, url: &str) -> Result<Bytes> {
        self.get(&Value::String(url.to_string())).await
    }
}

// == Resolve Reference ==
/// The `http(s)` URL an image reference points at.
pub fn resolve_reference(reference: &Value) -> Result<String> {
    let candidate = match reference {
        Value::String(url) => Some(url.as_str()),
        Value::Object(map) => REFERENCE_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => None,
    };

    match candidate {
        Some(url) if is_http_url(url) => Ok(url.to_string()),
        Some(url) => Err(CacheError::InvalidReference(format!(
            "not an http(s) url: {}",
            url
        ))),
        None => Err(CacheError::InvalidReference(format!(
            "unsupported image reference: {}",
            reference
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_string_and_objects() {
        assert_eq!(
            resolve_reference(&json!("https://h/a.png")).unwrap(),
            "https://h/a.png"
        );
        assert_eq!(
            resolve_reference(&json!({ "link": "https://h/b.png" })).unwrap(),
            "https://h/b.png"
        );
        assert_eq!(
            resolve_reference(&json!({ "url": "http://h/c.png" })).unwrap(),
            "http://h/c.png"
        );
        assert_eq!(
            resolve_reference(&json!({ "link": "https://h/d.png", "url": "https://h/e.png" })).unwrap(),
            "https://h/d.png"
        );
    }

    #[test]
    fn test_resolve_rejects_bad_references() {
        for reference in [
            json!("file:///etc/passwd"),
            json!({ "link": "data:image/png;base64,AAAA" }),
            json!({ "other": "https://h/a.png" }),
            json!(42),
            json!(null),
        ] {
            let err = resolve_reference(&reference).unwrap_err();
            assert!(matches!(err, CacheError::InvalidReference(_)), "{}", reference);
        }
    }
}

//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheSettings;
use crate::fetch::{HttpSettings, RetryPolicy};
use crate::prefetch::PrefetchLimits;
use crate::transform::TransformPolicy;

/// Service configuration parameters.
///
/// All values can be configured via `IMG_*` environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Per-request HTTP timeout in milliseconds
    pub http_timeout_ms: u64,
    /// Upstream connections open at once per host
    pub max_sockets: usize,
    /// Bind outbound connections to IPv4
    pub force_ipv4: bool,
    /// Attempts per URL before giving up
    pub fetch_attempts: u32,
    /// Scheme placed before the token in the Authorization header
    pub auth_scheme: String,
    /// Warm the cache before rendering
    pub prefetch_enabled: bool,
    /// Prefetch jobs in flight overall
    pub global_concurrency: usize,
    /// Prefetch jobs in flight per host
    pub host_concurrency: usize,
    /// Resize/re-encode fetched images
    pub inline_resize_enabled: bool,
    pub max_width: u32,
    pub max_height: u32,
    /// Lossy encoder quality (1-100)
    pub quality: u8,
    /// Images smaller than this are stored as fetched
    pub min_bytes_to_touch: usize,
    pub convert_opaque_png_to_photo: bool,
    pub prefer_webp: bool,
    pub disk_cache_dir: PathBuf,
    pub disk_cache_ttl_ms: u64,
    pub mem_cache_max_entries: usize,
    /// Hosts to pre-connect to on startup and on /warmup
    pub warm_urls: Vec<String>,
    /// HTTP server port
    pub server_port: u16,
    /// Background memory purge interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults of [`Config::default`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            http_timeout_ms: env_parse("IMG_HTTP_TIMEOUT_MS", defaults.http_timeout_ms),
            max_sockets: env_parse("IMG_MAX_SOCKETS", defaults.max_sockets),
            force_ipv4: env_flag("IMG_FORCE_IPV4", defaults.force_ipv4),
            fetch_attempts: env_parse("IMG_FETCH_ATTEMPTS", defaults.fetch_attempts).max(1),
            auth_scheme: env::var("IMG_AUTH_SCHEME").unwrap_or(defaults.auth_scheme),
            prefetch_enabled: env_flag("IMG_PREFETCH", defaults.prefetch_enabled),
            global_concurrency: env_parse("IMG_PREFETCH_CONCURRENCY", defaults.global_concurrency)
                .max(1),
            host_concurrency: env_parse("IMG_HOST_CONCURRENCY", defaults.host_concurrency).max(1),
            inline_resize_enabled: env_flag("IMG_INLINE_RESIZE", defaults.inline_resize_enabled),
            max_width: env_parse("IMG_RESIZE_MAX_W", defaults.max_width),
            max_height: env_parse("IMG_RESIZE_MAX_H", defaults.max_height),
            quality: env_parse("IMG_RESIZE_QUALITY", defaults.quality).clamp(1, 100),
            min_bytes_to_touch: env_parse("IMG_MIN_BYTES_TO_TOUCH", defaults.min_bytes_to_touch),
            convert_opaque_png_to_photo: env_flag(
                "IMG_CONVERT_PNG_PHOTOS",
                defaults.convert_opaque_png_to_photo,
            ),
            prefer_webp: env_flag("IMG_PREFER_WEBP", defaults.prefer_webp),
            disk_cache_dir: env::var("IMG_DISK_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.disk_cache_dir),
            disk_cache_ttl_ms: env_parse("IMG_DISK_CACHE_TTL_MS", defaults.disk_cache_ttl_ms),
            mem_cache_max_entries: env_parse("IMG_CACHE_MAX_ENTRIES", defaults.mem_cache_max_entries),
            warm_urls: env::var("IMG_WARM_URLS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.warm_urls),
            server_port: env_parse("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_parse("IMG_CLEANUP_INTERVAL", defaults.cleanup_interval).max(1),
        }
    }

    pub fn transform_policy(&self) -> TransformPolicy {
        TransformPolicy {
            max_width: self.max_width,
            max_height: self.max_height,
            quality: self.quality,
            min_bytes_to_touch: self.min_bytes_to_touch,
            convert_opaque_png_to_photo: self.convert_opaque_png_to_photo,
            prefer_webp: self.prefer_webp,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch_attempts,
            ..RetryPolicy::default()
        }
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_millis(self.http_timeout_ms),
            max_sockets: self.max_sockets,
            force_ipv4: self.force_ipv4,
            auth_scheme: self.auth_scheme.clone(),
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            max_entries: self.mem_cache_max_entries,
            ttl: Duration::from_millis(self.disk_cache_ttl_ms),
            disk_dir: self.disk_cache_dir.clone(),
            transform_enabled: self.inline_resize_enabled,
        }
    }

    pub fn prefetch_limits(&self) -> PrefetchLimits {
        PrefetchLimits {
            global_concurrency: self.global_concurrency,
            host_concurrency: self.host_concurrency,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout_ms: 20_000,
            max_sockets: 16,
            force_ipv4: false,
            fetch_attempts: 4,
            auth_scheme: "Bearer".to_string(),
            prefetch_enabled: true,
            global_concurrency: 10,
            host_concurrency: 10,
            inline_resize_enabled: true,
            max_width: 1800,
            max_height: 1800,
            quality: 78,
            min_bytes_to_touch: 200_000,
            convert_opaque_png_to_photo: true,
            prefer_webp: false,
            disk_cache_dir: env::temp_dir().join("img-cache"),
            disk_cache_ttl_ms: 10 * 60 * 1000,
            mem_cache_max_entries: 2000,
            warm_urls: Vec::new(),
            server_port: 3000,
            cleanup_interval: 60,
        }
    }
}

// == Env Helpers ==
fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name).ok().as_deref().map(str::trim) {
        Some("true") => true,
        Some("false") => false,
        _ => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

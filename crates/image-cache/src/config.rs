//! Coordinator configuration

use crate::types::DEFAULT_QUALITY;
use file_blob_cache::{DiskCacheConfig, DEFAULT_EXTENSION};
use remote_blob_fetcher::RetryPolicy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MAINTENANCE_EVERY: u64 = 25;
const DEFAULT_PLACEHOLDER_PATH: &str = "assets/images/placeholder.png";

#[derive(Debug, Clone, PartialEq)]
pub struct ImageCacheConfig {
    pub disk: DiskCacheConfig,
    pub retry: RetryPolicy,
    /// Resolve calls between opportunistic maintenance passes; 0 disables them
    pub maintenance_every: u64,
    /// Bundled image shown when resolution fails
    pub placeholder_path: PathBuf,
    pub default_extension: String,
    pub default_quality: f32,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            disk: DiskCacheConfig::default(),
            retry: RetryPolicy::default(),
            maintenance_every: DEFAULT_MAINTENANCE_EVERY,
            placeholder_path: PathBuf::from(DEFAULT_PLACEHOLDER_PATH),
            default_extension: DEFAULT_EXTENSION.to_string(),
            default_quality: DEFAULT_QUALITY,
        }
    }
}

impl ImageCacheConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from any name → value source
    ///
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let disk = DiskCacheConfig {
            cache_dir: lookup("IMAGE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.disk.cache_dir),
            max_total_bytes: parsed(&lookup, "IMAGE_CACHE_MAX_BYTES")
                .unwrap_or(defaults.disk.max_total_bytes),
            max_entries: parsed(&lookup, "IMAGE_CACHE_MAX_ENTRIES")
                .unwrap_or(defaults.disk.max_entries),
            freshness_window: parsed(&lookup, "IMAGE_CACHE_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.disk.freshness_window),
        };

        let retry = RetryPolicy {
            max_attempts: parsed(&lookup, "IMAGE_FETCH_MAX_ATTEMPTS")
                .unwrap_or(defaults.retry.max_attempts),
            initial_delay: parsed(&lookup, "IMAGE_FETCH_INITIAL_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.initial_delay),
            // 0 disables the per-attempt timeout
            attempt_timeout: match parsed::<u64, _>(&lookup, "IMAGE_FETCH_TIMEOUT_SECS") {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.retry.attempt_timeout,
            },
        };

        Self {
            disk,
            retry,
            maintenance_every: parsed(&lookup, "IMAGE_CACHE_MAINTENANCE_EVERY")
                .unwrap_or(defaults.maintenance_every),
            placeholder_path: lookup("IMAGE_PLACEHOLDER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.placeholder_path),
            default_extension: defaults.default_extension,
            default_quality: defaults.default_quality,
        }
    }
}

fn parsed<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|value| value.trim().parse().ok())
}

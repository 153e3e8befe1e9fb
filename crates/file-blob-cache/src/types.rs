//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 50 * 1024 * 1024; // 50 MiB
pub const DEFAULT_MAX_ENTRIES: usize = 100;
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Limits and location of the on-disk cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskCacheConfig {
    pub cache_dir: PathBuf,
    /// Eviction runs only once the directory holds more than this many bytes
    pub max_total_bytes: u64,
    /// Survivor count after eviction, and capacity of the in-memory index
    pub max_entries: usize,
    /// Files older than this are reported as misses
    pub freshness_window: Duration,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache/images"),
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_entries: DEFAULT_MAX_ENTRIES,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }
}

/// A cached file as seen by an eviction scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Combined age + size rank; larger scores are evicted first
    ///
    /// Milliseconds and bytes are added as-is. Only the ordering matters:
    /// between two files of equal size the older one scores higher, and
    /// between two files of equal age the larger one does.
    pub fn eviction_score(&self, now: DateTime<Utc>) -> u128 {
        let age_ms = (now - self.modified_at).num_milliseconds().max(0) as u128;
        age_ms + self.size_bytes as u128
    }
}

/// Outcome of one eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub files_scanned: usize,
    pub size_before: u64,
    pub size_after: u64,
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub index_entries_removed: usize,
    /// The scan failed and nothing was touched
    pub aborted: bool,
}

impl EvictionReport {
    pub fn aborted() -> Self {
        Self {
            aborted: true,
            ..Default::default()
        }
    }
}

/// Current footprint of the cache directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub files: usize,
    pub total_bytes: u64,
}

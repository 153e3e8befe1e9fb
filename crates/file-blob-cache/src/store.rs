//! On-disk store for cached blobs
//!
//! Files live flat in one directory, named after their percent-encoded key.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader only ever sees complete files.

use crate::error::{CacheError, Result};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::index::CacheIndex;
use crate::types::{CacheEntry, DiskCacheConfig, DiskUsage, EvictionReport, DEFAULT_EXTENSION};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Suffix of in-progress writes; such files are never served or scored
pub const TEMP_SUFFIX: &str = ".cache-tmp";

/// Longest file name produced from a key before falling back to a digest
const MAX_FILE_NAME_LEN: usize = 240;

/// Directory-backed blob store with freshness checks and eviction
///
/// Cheap to clone; clones share the filesystem handle, config and index.
#[derive(Clone)]
pub struct DiskCacheStore {
    fs: Arc<dyn FileSystem>,
    config: Arc<DiskCacheConfig>,
    index: CacheIndex,
    temp_seq: Arc<AtomicU64>,
}

impl DiskCacheStore {
    /// Create a store on the local filesystem
    pub fn new(config: DiskCacheConfig, index: CacheIndex) -> Self {
        Self::with_file_system(config, index, Arc::new(TokioFileSystem))
    }

    pub fn with_file_system(
        config: DiskCacheConfig,
        index: CacheIndex,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            fs,
            config: Arc::new(config),
            index,
            temp_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &DiskCacheConfig {
        &self.config
    }

    pub fn index(&self) -> &CacheIndex {
        &self.index
    }

    /// Create the cache directory and clear out writes interrupted by a previous run
    pub async fn init(&self) -> Result<()> {
        self.fs.ensure_dir(&self.config.cache_dir).await?;

        let mut removed = 0;
        for name in self.fs.read_dir(&self.config.cache_dir).await? {
            if name.ends_with(TEMP_SUFFIX) {
                self.fs.delete_file(&self.config.cache_dir.join(&name)).await?;
                removed += 1;
            }
        }

        info!(cache_dir = ?self.config.cache_dir, stale_temp_files = removed, "Cache initialized");
        Ok(())
    }

    /// File name for a key: percent-encoded key plus extension
    ///
    /// Percent-encoding is injective, so distinct keys never share a file.
    /// Keys too long to encode within a file name use their SHA-256 digest.
    pub fn file_name_for(key: &str, extension: &str) -> String {
        let extension = match extension.trim_start_matches('.') {
            "" => DEFAULT_EXTENSION,
            ext => ext,
        };

        let encoded = urlencoding::encode(key);
        if encoded.len() + extension.len() + 1 <= MAX_FILE_NAME_LEN {
            format!("{}.{}", encoded, extension)
        } else {
            let digest = hex::encode(Sha256::digest(key.as_bytes()));
            format!("{}.{}", digest, extension)
        }
    }

    pub fn path_for(&self, key: &str, extension: &str) -> PathBuf {
        self.config
            .cache_dir
            .join(Self::file_name_for(key, extension))
    }

    /// Unique sibling for an in-progress write
    ///
    /// Kept short and independent of the final name so it always fits the
    /// filesystem's name limit, however long the key's own file name is.
    fn temp_path(&self) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        self.config.cache_dir.join(format!(
            ".{}-{}{}",
            std::process::id(),
            seq,
            TEMP_SUFFIX
        ))
    }

    /// Path of the cached file for `key` if it exists and is still fresh
    ///
    /// Stale files are reported as misses but left on disk.
    pub async fn lookup_fresh(&self, key: &str, extension: &str) -> Option<PathBuf> {
        if key.is_empty() {
            return None;
        }

        let path = self.path_for(key, extension);
        match self.fs.stat(&path).await {
            Ok(Some(stat)) => {
                if is_fresh(stat.modified_at, Utc::now(), self.config.freshness_window) {
                    debug!(key, path = ?path, "Disk cache hit");
                    Some(path)
                } else {
                    debug!(key, modified_at = %stat.modified_at, "Disk cache entry stale");
                    None
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to stat cached file");
                None
            }
        }
    }

    /// Store `bytes` for `key`, replacing any previous content
    pub async fn write(&self, key: &str, bytes: &[u8], extension: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }

        self.fs.ensure_dir(&self.config.cache_dir).await?;

        let path = self.path_for(key, extension);
        let temp_path = self.temp_path();

        if let Err(e) = self.fs.write_bytes(&temp_path, bytes).await {
            let _ = self.fs.delete_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = self.fs.rename(&temp_path, &path).await {
            let _ = self.fs.delete_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(key, size = bytes.len(), path = ?path, "Cached blob");
        Ok(path)
    }

    /// Delete the cached file for `key` and drop its index entry
    ///
    /// Returns whether a file was present.
    pub async fn invalidate(&self, key: &str, extension: &str) -> Result<bool> {
        let path = self.path_for(key, extension);
        let existed = self.fs.exists(&path).await?;
        self.fs.delete_file(&path).await?;
        self.index.remove(key).await;

        debug!(key, existed, "Invalidated cache entry");
        Ok(existed)
    }

    /// List every complete cached file with its size and mtime
    async fn scan(&self) -> io::Result<Vec<CacheEntry>> {
        let names = match self.fs.read_dir(&self.config.cache_dir).await {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }
            let path = self.config.cache_dir.join(&name);
            // Deleted between listing and stat
            if let Some(stat) = self.fs.stat(&path).await? {
                entries.push(CacheEntry {
                    path,
                    size_bytes: stat.size_bytes,
                    modified_at: stat.modified_at,
                });
            }
        }
        Ok(entries)
    }

    pub async fn disk_usage(&self) -> Result<DiskUsage> {
        let entries = self.scan().await?;
        Ok(DiskUsage {
            files: entries.len(),
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
        })
    }

    /// Delete old and large files once the directory exceeds its byte budget
    ///
    /// Files are ranked by [`CacheEntry::eviction_score`], highest first, and
    /// deleted until no more than `max_entries` remain and the survivors fit
    /// in `max_total_bytes`. Scan failures abort the pass without touching the
    /// index; they are logged, never returned.
    pub async fn evict_if_over_budget(&self) -> EvictionReport {
        let started = Instant::now();

        let entries = match self.scan().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(cache_dir = ?self.config.cache_dir, error = %e, "Cache scan failed, skipping eviction");
                return EvictionReport::aborted();
            }
        };

        let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
        let mut report = EvictionReport {
            files_scanned: entries.len(),
            size_before: total,
            size_after: total,
            ..Default::default()
        };

        if total <= self.config.max_total_bytes {
            debug!(
                total_bytes = total,
                max_bytes = self.config.max_total_bytes,
                "Cache within budget"
            );
            return report;
        }

        let victims = select_victims(
            entries,
            Utc::now(),
            self.config.max_entries,
            self.config.max_total_bytes,
        );

        let mut deleted = HashSet::with_capacity(victims.len());
        for victim in victims {
            match self.fs.delete_file(&victim.path).await {
                Ok(()) => {
                    report.files_deleted += 1;
                    report.bytes_freed += victim.size_bytes;
                    deleted.insert(victim.path);
                }
                Err(e) => {
                    warn!(path = ?victim.path, error = %e, "Failed to delete cached file");
                }
            }
        }

        report.size_after = total - report.bytes_freed;
        report.index_entries_removed = self.index.remove_paths(&deleted).await;

        info!(
            files_deleted = report.files_deleted,
            bytes_freed = report.bytes_freed,
            size_before = report.size_before,
            size_after = report.size_after,
            duration_ms = started.elapsed().as_millis() as u64,
            "Cache eviction complete"
        );

        report
    }

    /// Trim the in-memory index to `max_entries`, oldest inserted first
    ///
    /// Index only; files on disk are untouched.
    pub async fn prune_index_if_over_capacity(&self) -> usize {
        let pruned = self.index.prune_to(self.config.max_entries).await;
        if !pruned.is_empty() {
            debug!(pruned = pruned.len(), "Pruned cache index");
        }
        pruned.len()
    }
}

/// Whether a file modified at `modified_at` is still fresh at `now`
///
/// The window is exclusive: a file exactly `window` old is stale.
pub fn is_fresh(modified_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    match chrono::Duration::from_std(window) {
        Ok(window) => now - modified_at < window,
        // Window too large to represent: nothing ever expires
        Err(_) => true,
    }
}

/// Pick files to delete, highest eviction score first
fn select_victims(
    mut entries: Vec<CacheEntry>,
    now: DateTime<Utc>,
    max_entries: usize,
    max_total_bytes: u64,
) -> Vec<CacheEntry> {
    entries.sort_by_cached_key(|e| std::cmp::Reverse(e.eviction_score(now)));

    let mut survivors = entries.len();
    let mut remaining: u64 = entries.iter().map(|e| e.size_bytes).sum();
    let mut victims = Vec::new();

    for entry in entries {
        if survivors <= max_entries && remaining <= max_total_bytes {
            break;
        }
        survivors -= 1;
        remaining -= entry.size_bytes;
        victims.push(entry);
    }

    victims
}

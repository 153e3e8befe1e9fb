//! Resolves image keys to fresh local files
//!
//! Lookup order is the in-memory index, then the disk cache, then the remote
//! store. A full miss fetches (with retry), transforms and writes the image,
//! and only records it in the index once the write has succeeded.

use crate::coalesce::{InFlight, Registration};
use crate::config::ImageCacheConfig;
use crate::error::{ImageCacheError, Result};
use crate::transform::ImageTransform;
use crate::types::{CacheEvent, CacheStats, ImageSource, ResolveOptions};
use file_blob_cache::{
    CacheError, CacheIndex, DiskCacheStore, EvictionReport, FileSystem, TokioFileSystem,
};
use remote_blob_fetcher::{FetchError, RemoteFetcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
    coalesced: AtomicU64,
}

/// Process-wide image cache, constructed once and shared by every image view
pub struct ImageCacheCoordinator {
    store: DiskCacheStore,
    fetcher: RemoteFetcher,
    transform: Arc<dyn ImageTransform>,
    in_flight: Arc<InFlight>,
    events: broadcast::Sender<CacheEvent>,
    placeholder_path: PathBuf,
    default_extension: String,
    default_quality: f32,
    maintenance_every: u64,
    maintenance_running: Arc<AtomicBool>,
    resolve_calls: AtomicU64,
    counters: Counters,
}

impl ImageCacheCoordinator {
    /// Create a coordinator caching on the local filesystem
    ///
    /// The fetcher's retry policy is replaced by `config.retry`.
    pub fn new(
        config: ImageCacheConfig,
        fetcher: RemoteFetcher,
        transform: Arc<dyn ImageTransform>,
    ) -> Self {
        Self::with_file_system(config, Arc::new(TokioFileSystem), fetcher, transform)
    }

    pub fn with_file_system(
        config: ImageCacheConfig,
        fs: Arc<dyn FileSystem>,
        fetcher: RemoteFetcher,
        transform: Arc<dyn ImageTransform>,
    ) -> Self {
        let store = DiskCacheStore::with_file_system(config.disk, CacheIndex::new(), fs);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            store,
            fetcher: fetcher.with_policy(config.retry),
            transform,
            in_flight: Arc::new(InFlight::default()),
            events,
            placeholder_path: config.placeholder_path,
            default_extension: config.default_extension,
            default_quality: config.default_quality,
            maintenance_every: config.maintenance_every,
            maintenance_running: Arc::new(AtomicBool::new(false)),
            resolve_calls: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// Prepare the cache directory; call once at startup
    pub async fn init(&self) -> Result<()> {
        self.store.init().await?;
        info!(cache_dir = ?self.store.config().cache_dir, "Image cache ready");
        Ok(())
    }

    pub fn store(&self) -> &DiskCacheStore {
        &self.store
    }

    /// Resolve options at the configured default extension and quality
    pub fn options(&self, width: u32, height: u32) -> ResolveOptions {
        ResolveOptions::new(width, height)
            .with_extension(&self.default_extension)
            .with_quality(self.default_quality)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Local path of an up-to-date copy of the image behind `key`
    pub async fn resolve(&self, key: &str, options: &ResolveOptions) -> Result<PathBuf> {
        if key.trim().is_empty() {
            return Err(ImageCacheError::InvalidKey);
        }

        self.maybe_schedule_maintenance();

        let index = self.store.index();
        if let Some(path) = index.get(key).await {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Memory index hit");
            return Ok(path);
        }

        if let Some(path) = self.store.lookup_fresh(key, &options.extension).await {
            index.insert(key, path.clone()).await;
            self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(path);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, "Cache miss");

        let result = self.resolve_miss(key, options).await;
        if let Err(e) = &result {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            error!(key, error = %e, "Image resolution failed");
        }
        result
    }

    /// Like [`resolve`](Self::resolve), but falls back to the bundled placeholder
    pub async fn resolve_or_placeholder(&self, key: &str, options: &ResolveOptions) -> ImageSource {
        match self.resolve(key, options).await {
            Ok(path) => ImageSource::Cached(path),
            Err(error) => ImageSource::Placeholder {
                path: self.placeholder_path.clone(),
                error,
            },
        }
    }

    async fn resolve_miss(&self, key: &str, options: &ResolveOptions) -> Result<PathBuf> {
        loop {
            match self.in_flight.register(key) {
                Registration::Leader(guard) => {
                    // Another leader may have finished since our index lookup
                    let result = match self.store.index().get(key).await {
                        Some(path) => Ok(path),
                        None => self.populate(key, options).await,
                    };
                    guard.complete(&result);
                    return result;
                }
                Registration::Follower(mut rx) => match rx.recv().await {
                    Ok(result) => {
                        self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                        return result;
                    }
                    Err(_) => {
                        debug!(key, "In-flight fetch abandoned, starting over");
                    }
                },
            }
        }
    }

    /// Fetch, transform and write one image, then index it
    async fn populate(&self, key: &str, options: &ResolveOptions) -> Result<PathBuf> {
        let transform_options = options.transform_options();
        transform_options.validate()?;

        let raw = self
            .fetcher
            .fetch_with_retry(key)
            .await
            .map_err(|e| self.fetch_failed(key, e))?;

        let transformed = self.transform.transform(raw, &transform_options).await?;

        let path = self
            .write_to_disk(key, transformed, &options.extension)
            .await?;
        self.store.index().insert(key, path.clone()).await;

        debug!(key, path = ?path, "Cached image");
        Ok(path)
    }

    fn fetch_failed(&self, key: &str, err: FetchError) -> ImageCacheError {
        let err = ImageCacheError::from(err);
        if let ImageCacheError::DownloadExhausted { attempts, .. } = &err {
            let _ = self.events.send(CacheEvent::DownloadExhausted {
                key: key.to_string(),
                attempts: *attempts,
            });
        }
        err
    }

    /// Write in a separate task so a cancelled `resolve` never stops a write midway
    async fn write_to_disk(&self, key: &str, bytes: Vec<u8>, extension: &str) -> Result<PathBuf> {
        let store = self.store.clone();
        let key = key.to_string();
        let extension = extension.to_string();

        let handle = tokio::spawn(async move { store.write(&key, &bytes, &extension).await });

        match handle.await {
            Ok(result) => Ok(result?),
            Err(join_err) => Err(ImageCacheError::WriteFailed(Arc::new(CacheError::Io(
                std::io::Error::other(join_err.to_string()),
            )))),
        }
    }

    /// Drop the cached file and index entry for `key`
    pub async fn invalidate(&self, key: &str, extension: &str) -> Result<bool> {
        if key.trim().is_empty() {
            return Err(ImageCacheError::InvalidKey);
        }
        Ok(self.store.invalidate(key, extension).await?)
    }

    fn maybe_schedule_maintenance(&self) {
        if self.maintenance_every == 0 {
            return;
        }
        let calls = self.resolve_calls.fetch_add(1, Ordering::Relaxed) + 1;
        if calls % self.maintenance_every == 0 {
            self.spawn_maintenance();
        }
    }

    /// Start eviction and index pruning in the background
    ///
    /// Returns `None` when a pass is already running.
    pub fn spawn_maintenance(&self) -> Option<JoinHandle<EvictionReport>> {
        if self.maintenance_running.swap(true, Ordering::AcqRel) {
            debug!("Cache maintenance already running");
            return None;
        }

        let store = self.store.clone();
        let running = Arc::clone(&self.maintenance_running);
        let events = self.events.clone();

        Some(tokio::spawn(async move {
            let report = maintenance_pass(&store).await;
            running.store(false, Ordering::Release);
            let _ = events.send(CacheEvent::MaintenanceCompleted(report.clone()));
            report
        }))
    }

    /// Run eviction and index pruning on the current task
    pub async fn run_maintenance(&self) -> EvictionReport {
        let report = maintenance_pass(&self.store).await;
        let _ = self
            .events
            .send(CacheEvent::MaintenanceCompleted(report.clone()));
        report
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            indexed_entries: self.store.index().len().await,
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.counters.disk_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
        }
    }
}

async fn maintenance_pass(store: &DiskCacheStore) -> EvictionReport {
    let report = store.evict_if_over_budget().await;
    let pruned = store.prune_index_if_over_capacity().await;

    if report.files_deleted > 0 || pruned > 0 {
        info!(
            files_deleted = report.files_deleted,
            bytes_freed = report.bytes_freed,
            index_pruned = pruned,
            "Cache maintenance complete"
        );
    }
    report
}

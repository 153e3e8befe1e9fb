//! Request, result and statistics types

use crate::error::ImageCacheError;
use crate::transform::TransformOptions;
use file_blob_cache::EvictionReport;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_QUALITY: f32 = 0.6;

/// What the caller wants the cached image to look like
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    pub width: u32,
    pub height: u32,
    pub extension: String,
    pub quality: f32,
}

impl ResolveOptions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            extension: file_blob_cache::DEFAULT_EXTENSION.to_string(),
            quality: DEFAULT_QUALITY,
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            width: self.width,
            height: self.height,
            quality: self.quality,
            format: self.extension.clone(),
        }
    }
}

/// Image to display: the cached file, or the bundled placeholder plus the failure
#[derive(Debug, Clone)]
pub enum ImageSource {
    Cached(PathBuf),
    Placeholder {
        path: PathBuf,
        error: ImageCacheError,
    },
}

impl ImageSource {
    pub fn path(&self) -> &Path {
        match self {
            ImageSource::Cached(path) => path,
            ImageSource::Placeholder { path, .. } => path,
        }
    }

    /// Whether the UI should offer a manual retry
    pub fn needs_retry(&self) -> bool {
        matches!(self, ImageSource::Placeholder { .. })
    }
}

/// Notifications for the host application
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A download gave up after exhausting its retries; worth telling the user
    DownloadExhausted { key: String, attempts: u32 },
    MaintenanceCompleted(EvictionReport),
}

/// Counters since the coordinator was created
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub indexed_entries: usize,
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub failures: u64,
    /// Misses served by another caller's in-flight fetch
    pub coalesced: u64,
}

//! File-based blob cache with freshness windows and age/size-scored eviction
//!
//! Stores blobs as files in a single directory behind a pluggable
//! [`FileSystem`], answers freshness queries from file modification times,
//! and keeps a shared in-memory [`CacheIndex`] in step with evictions.

mod error;
mod fs;
mod index;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod store;
mod types;

pub use error::{CacheError, Result};
pub use fs::{FileStat, FileSystem, TokioFileSystem};
pub use index::CacheIndex;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryFileSystem;
pub use store::{is_fresh, DiskCacheStore, TEMP_SUFFIX};
pub use types::{
    CacheEntry, DiskCacheConfig, DiskUsage, EvictionReport, DEFAULT_EXTENSION,
    DEFAULT_FRESHNESS_WINDOW, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_TOTAL_BYTES,
};

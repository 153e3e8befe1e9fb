//! Image cache for installation photos
//!
//! Turns a remote photo key (a storage path or a direct URL) plus display
//! dimensions into the path of a fresh, resized local copy. Lookups go
//! through an in-memory index and a bounded disk cache before falling back
//! to a retried remote fetch.
//!
//! # Example
//!
//! ```no_run
//! use image_cache::{ImageCacheConfig, ImageCacheCoordinator, PassthroughTransform};
//! use remote_blob_fetcher::{HttpBlobTransfer, RemoteFetcher, StorageLocatorResolver};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), image_cache::ImageCacheError> {
//! let fetcher = RemoteFetcher::new(
//!     Arc::new(StorageLocatorResolver::new("decor-inventory.appspot.com")),
//!     Arc::new(HttpBlobTransfer::new()),
//! );
//! let cache = ImageCacheCoordinator::new(
//!     ImageCacheConfig::from_env(),
//!     fetcher,
//!     Arc::new(PassthroughTransform),
//! );
//! cache.init().await?;
//!
//! let path = cache
//!     .resolve("installations/42/front.jpg", &cache.options(200, 200))
//!     .await?;
//! println!("{}", path.display());
//! # Ok(())
//! # }
//! ```

mod coalesce;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod transform;
pub mod types;

pub use config::ImageCacheConfig;
pub use coordinator::ImageCacheCoordinator;
pub use error::{ImageCacheError, Result};
pub use logging::init_tracing;
pub use transform::{ImageTransform, PassthroughTransform, TransformError, TransformOptions};
pub use types::{CacheEvent, CacheStats, ImageSource, ResolveOptions};

//! Error types for image resolution
//!
//! Every failure inside `resolve` surfaces as one of these kinds. Causes are
//! held behind `Arc` so a single failure can be handed to every caller that
//! was waiting on the same key.

use crate::transform::TransformError;
use file_blob_cache::CacheError;
use remote_blob_fetcher::{FetchError, TransferError};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum ImageCacheError {
    /// Empty or blank key; nothing was attempted
    InvalidKey,
    /// The remote store has no object for the key
    LocatorNotFound(String),
    /// The remote fetch failed before any transfer could be attempted
    FetchFailed(Arc<FetchError>),
    /// Every transfer attempt failed
    DownloadExhausted {
        attempts: u32,
        last: Arc<TransferError>,
    },
    TransformFailed(Arc<TransformError>),
    /// The cache write failed; the index was left untouched
    WriteFailed(Arc<CacheError>),
}

impl fmt::Display for ImageCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageCacheError::InvalidKey => write!(f, "Image key must not be empty"),
            ImageCacheError::LocatorNotFound(key) => write!(f, "Image not found: {}", key),
            ImageCacheError::FetchFailed(err) => write!(f, "Fetch failed: {}", err),
            ImageCacheError::DownloadExhausted { attempts, last } => {
                write!(f, "Download failed after {} attempts: {}", attempts, last)
            }
            ImageCacheError::TransformFailed(err) => write!(f, "Transform failed: {}", err),
            ImageCacheError::WriteFailed(err) => write!(f, "Cache write failed: {}", err),
        }
    }
}

impl std::error::Error for ImageCacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageCacheError::FetchFailed(err) => Some(err.as_ref()),
            ImageCacheError::DownloadExhausted { last, .. } => Some(last.as_ref()),
            ImageCacheError::TransformFailed(err) => Some(err.as_ref()),
            ImageCacheError::WriteFailed(err) => Some(err.as_ref()),
            ImageCacheError::InvalidKey | ImageCacheError::LocatorNotFound(_) => None,
        }
    }
}

impl From<FetchError> for ImageCacheError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::LocatorNotFound(key) => ImageCacheError::LocatorNotFound(key),
            FetchError::DownloadExhausted { attempts, last } => ImageCacheError::DownloadExhausted {
                attempts,
                last: Arc::new(last),
            },
            other => ImageCacheError::FetchFailed(Arc::new(other)),
        }
    }
}

impl From<TransformError> for ImageCacheError {
    fn from(err: TransformError) -> Self {
        ImageCacheError::TransformFailed(Arc::new(err))
    }
}

impl From<CacheError> for ImageCacheError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidKey => ImageCacheError::InvalidKey,
            other => ImageCacheError::WriteFailed(Arc::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImageCacheError>;

#[cfg(test)]
mod tests {
    use super::*;
    use remote_blob_fetcher::LocatorError;
    use std::error::Error;

    #[test]
    fn test_invalid_key_display() {
        assert_eq!(
            ImageCacheError::InvalidKey.to_string(),
            "Image key must not be empty"
        );
    }

    #[test]
    fn test_fetch_errors_map_to_distinct_kinds() {
        let not_found: ImageCacheError = FetchError::LocatorNotFound("photos/a.jpg".into()).into();
        assert!(matches!(not_found, ImageCacheError::LocatorNotFound(ref k) if k == "photos/a.jpg"));

        let exhausted: ImageCacheError = FetchError::DownloadExhausted {
            attempts: 5,
            last: TransferError::Status(500),
        }
        .into();
        assert!(matches!(exhausted, ImageCacheError::DownloadExhausted { attempts: 5, .. }));
        assert!(exhausted.source().is_some());

        let unavailable: ImageCacheError =
            FetchError::LocatorUnavailable(LocatorError::Unavailable("status 503".into())).into();
        assert!(matches!(unavailable, ImageCacheError::FetchFailed(_)));
    }

    #[test]
    fn test_cache_io_error_is_write_failed() {
        let err: ImageCacheError =
            CacheError::Io(std::io::Error::other("disk full")).into();
        assert!(matches!(err, ImageCacheError::WriteFailed(_)));
        assert_eq!(err.to_string(), "Cache write failed: IO error: disk full");
    }

    #[test]
    fn test_clone_shares_cause() {
        let err: ImageCacheError = TransformError::Failed("corrupt jpeg".into()).into();
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}

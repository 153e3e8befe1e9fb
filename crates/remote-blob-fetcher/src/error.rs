//! Error types for remote blob fetching

use std::fmt;
use std::time::Duration;

/// A single failed transfer of bytes from an already-resolved URL
#[derive(Debug)]
pub enum TransferError {
    Http(Box<reqwest::Error>),
    Status(u16),
    Timeout(Duration),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Http(err) => write!(f, "HTTP error: {}", err),
            TransferError::Status(status) => write!(f, "Remote returned status {}", status),
            TransferError::Timeout(after) => {
                write!(f, "Transfer timed out after {}ms", after.as_millis())
            }
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        TransferError::Http(Box::new(err))
    }
}

/// Failure to turn a storage path into a downloadable URL
#[derive(Debug)]
pub enum LocatorError {
    NotFound(String),
    Unavailable(String),
    Http(Box<reqwest::Error>),
}

impl fmt::Display for LocatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorError::NotFound(path) => write!(f, "Remote object not found: {}", path),
            LocatorError::Unavailable(msg) => write!(f, "Locator unavailable: {}", msg),
            LocatorError::Http(err) => write!(f, "HTTP error: {}", err),
        }
    }
}

impl std::error::Error for LocatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LocatorError::Http(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LocatorError {
    fn from(err: reqwest::Error) -> Self {
        LocatorError::Http(Box::new(err))
    }
}

/// Terminal outcome of [`crate::RemoteFetcher::fetch_with_retry`]
#[derive(Debug)]
pub enum FetchError {
    /// The backend has no object for this key. Never retried.
    LocatorNotFound(String),
    /// Locator resolution failed for a reason other than a missing object.
    LocatorUnavailable(LocatorError),
    /// Every transfer attempt failed; carries the last failure.
    DownloadExhausted { attempts: u32, last: TransferError },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::LocatorNotFound(key) => write!(f, "Locator not found for {}", key),
            FetchError::LocatorUnavailable(err) => write!(f, "Locator resolution failed: {}", err),
            FetchError::DownloadExhausted { attempts, last } => {
                write!(f, "Download failed after {} attempts: {}", attempts, last)
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::LocatorUnavailable(err) => Some(err),
            FetchError::DownloadExhausted { last, .. } => Some(last),
            FetchError::LocatorNotFound(_) => None,
        }
    }
}

impl From<LocatorError> for FetchError {
    fn from(err: LocatorError) -> Self {
        match err {
            LocatorError::NotFound(path) => FetchError::LocatorNotFound(path),
            other => FetchError::LocatorUnavailable(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_status_error_display() {
        let err = TransferError::Status(503);
        assert_eq!(format!("{}", err), "Remote returned status 503");
    }

    #[test]
    fn test_timeout_error_display() {
        let err = TransferError::Timeout(Duration::from_secs(30));
        assert_eq!(format!("{}", err), "Transfer timed out after 30000ms");
    }

    #[test]
    fn test_not_found_locator_maps_to_locator_not_found() {
        let err: FetchError = LocatorError::NotFound("photos/a.jpg".to_string()).into();
        assert!(matches!(err, FetchError::LocatorNotFound(ref p) if p == "photos/a.jpg"));
    }

    #[test]
    fn test_other_locator_errors_map_to_unavailable() {
        let err: FetchError = LocatorError::Unavailable("status 500".to_string()).into();
        assert!(matches!(err, FetchError::LocatorUnavailable(_)));
        assert!(err.to_string().contains("status 500"));
    }

    #[test]
    fn test_download_exhausted_carries_last_error() {
        let err = FetchError::DownloadExhausted {
            attempts: 5,
            last: TransferError::Status(502),
        };
        assert_eq!(
            err.to_string(),
            "Download failed after 5 attempts: Remote returned status 502"
        );
        assert!(err.source().is_some());
    }
}

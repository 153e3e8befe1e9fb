//! Error types for the file blob cache

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    InvalidKey,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::InvalidKey => write!(f, "Cache key must not be empty"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err),
            CacheError::InvalidKey => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = CacheError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only volume",
        ));
        assert_eq!(format!("{}", err), "IO error: read-only volume");
    }

    #[test]
    fn test_invalid_key_display() {
        assert_eq!(
            CacheError::InvalidKey.to_string(),
            "Cache key must not be empty"
        );
    }
}

//! Resize/recompress step applied to fetched bytes before caching

use async_trait::async_trait;
use std::fmt;

/// Target of a transform
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOptions {
    pub width: u32,
    pub height: u32,
    /// Compression quality in `(0, 1]`
    pub quality: f32,
    /// Output encoding, named by file extension (`jpg`, `png`, `webp`)
    pub format: String,
}

impl TransformOptions {
    pub fn validate(&self) -> Result<(), TransformError> {
        if self.width == 0 || self.height == 0 {
            return Err(TransformError::InvalidOptions(format!(
                "dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(TransformError::InvalidOptions(format!(
                "quality must be in (0, 1], got {}",
                self.quality
            )));
        }
        if self.format.is_empty() {
            return Err(TransformError::InvalidOptions(
                "output format must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum TransformError {
    InvalidOptions(String),
    Failed(String),
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::InvalidOptions(msg) => write!(f, "Invalid transform options: {}", msg),
            TransformError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TransformError {}

/// Pure bytes-in, bytes-out image transform supplied by the host platform
#[async_trait]
pub trait ImageTransform: Send + Sync {
    async fn transform(
        &self,
        bytes: Vec<u8>,
        options: &TransformOptions,
    ) -> Result<Vec<u8>, TransformError>;
}

/// Caches the fetched bytes unchanged
///
/// For backends that already serve thumbnails at display size.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransform;

#[async_trait]
impl ImageTransform for PassthroughTransform {
    async fn transform(
        &self,
        bytes: Vec<u8>,
        _options: &TransformOptions,
    ) -> Result<Vec<u8>, TransformError> {
        if bytes.is_empty() {
            return Err(TransformError::Failed("empty image".to_string()));
        }
        Ok(bytes)
    }
}

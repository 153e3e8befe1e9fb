//! Storage backend wire types

use serde::Deserialize;

/// Object metadata returned by the storage REST API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageObjectMetadata {
    pub name: String,
    pub bucket: String,
    /// Object size in bytes, serialized as a string by the API
    pub size: Option<String>,
    pub content_type: Option<String>,
    /// Comma-separated list of download tokens
    pub download_tokens: Option<String>,
}

impl StorageObjectMetadata {
    pub fn first_download_token(&self) -> Option<&str> {
        self.download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').map(str::trim).find(|t| !t.is_empty()))
    }
}

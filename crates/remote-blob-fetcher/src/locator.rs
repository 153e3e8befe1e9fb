//! Resolution of storage paths into download URLs

use crate::error::LocatorError;
use crate::transfer::DEFAULT_REQUEST_TIMEOUT;
use crate::types::StorageObjectMetadata;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

const DEFAULT_STORAGE_ENDPOINT: &str = "https://firebasestorage.googleapis.com";

/// Asks the remote backend to mint a download URL for a storage path
#[async_trait]
pub trait LocatorResolver: Send + Sync {
    async fn resolve_download_url(&self, remote_path: &str) -> Result<String, LocatorError>;
}

/// Resolves object paths in a storage bucket exposed over the Firebase Storage REST API
pub struct StorageLocatorResolver {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl StorageLocatorResolver {
    /// Create a resolver for `bucket` on the public storage endpoint
    pub fn new(bucket: &str) -> Self {
        Self::with_endpoint(DEFAULT_STORAGE_ENDPOINT, bucket)
    }

    /// Create a resolver against a custom endpoint (emulators, tests)
    pub fn with_endpoint(endpoint: &str, bucket: &str) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        }
    }

    fn object_url(&self, remote_path: &str) -> String {
        format!(
            "{}/v0/b/{}/o/{}",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(remote_path.trim_start_matches('/'))
        )
    }

    /// Build the media URL for an object given its metadata
    fn download_url(&self, remote_path: &str, metadata: &StorageObjectMetadata) -> String {
        let object_url = self.object_url(remote_path);
        match metadata.first_download_token() {
            Some(token) => format!(
                "{}?alt=media&token={}",
                object_url,
                urlencoding::encode(token)
            ),
            None => format!("{}?alt=media", object_url),
        }
    }
}

#[async_trait]
impl LocatorResolver for StorageLocatorResolver {
    async fn resolve_download_url(&self, remote_path: &str) -> Result<String, LocatorError> {
        let url = self.object_url(remote_path);
        debug!(path = remote_path, url = %url, "Resolving storage object");

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(LocatorError::NotFound(remote_path.to_string()));
        }

        if !response.status().is_success() {
            return Err(LocatorError::Unavailable(format!(
                "Storage returned status {}",
                response.status()
            )));
        }

        let metadata: StorageObjectMetadata = response.json().await?;
        let download_url = self.download_url(remote_path, &metadata);

        debug!(path = remote_path, size = ?metadata.size, "Resolved download URL");
        Ok(download_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(tokens: Option<&str>) -> StorageObjectMetadata {
        StorageObjectMetadata {
            name: "photos/a.jpg".to_string(),
            bucket: "decor-inventory.appspot.com".to_string(),
            size: Some("2048".to_string()),
            content_type: Some("image/jpeg".to_string()),
            download_tokens: tokens.map(|t| t.to_string()),
        }
    }

    #[test]
    fn test_object_url_encodes_path() {
        let resolver = StorageLocatorResolver::new("decor-inventory.appspot.com");
        assert_eq!(
            resolver.object_url("installations/42/photo 1.jpg"),
            "https://firebasestorage.googleapis.com/v0/b/decor-inventory.appspot.com/o/installations%2F42%2Fphoto%201.jpg"
        );
    }

    #[test]
    fn test_object_url_strips_leading_slash() {
        let resolver = StorageLocatorResolver::with_endpoint("http://localhost:9199/", "bucket");
        assert_eq!(
            resolver.object_url("/photos/a.jpg"),
            "http://localhost:9199/v0/b/bucket/o/photos%2Fa.jpg"
        );
    }

    #[test]
    fn test_download_url_uses_first_token() {
        let resolver = StorageLocatorResolver::with_endpoint("http://localhost:9199", "bucket");
        let url = resolver.download_url("photos/a.jpg", &metadata(Some("tok-1,tok-2")));
        assert_eq!(
            url,
            "http://localhost:9199/v0/b/bucket/o/photos%2Fa.jpg?alt=media&token=tok-1"
        );
    }

    #[test]
    fn test_download_url_without_token() {
        let resolver = StorageLocatorResolver::with_endpoint("http://localhost:9199", "bucket");
        let url = resolver.download_url("photos/a.jpg", &metadata(None));
        assert_eq!(url, "http://localhost:9199/v0/b/bucket/o/photos%2Fa.jpg?alt=media");
    }
}

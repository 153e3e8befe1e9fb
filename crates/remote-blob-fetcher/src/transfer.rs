//! Raw byte transfer from a resolved URL

use crate::error::TransferError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads the bytes behind a directly-fetchable URL
#[async_trait]
pub trait BlobTransfer: Send + Sync {
    async fn download(&self, url: &str) -> Result<Vec<u8>, TransferError>;
}

/// HTTP transfer backed by a shared reqwest client
pub struct HttpBlobTransfer {
    client: Client,
}

impl HttpBlobTransfer {
    /// Create a transfer whose requests give up after 30 seconds
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self::with_client(client)
    }

    /// Create a transfer that reuses an existing client (and its connection pool)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpBlobTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobTransfer for HttpBlobTransfer {
    async fn download(&self, url: &str) -> Result<Vec<u8>, TransferError> {
        debug!(url = %url, "Downloading blob");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Blob download failed");
            return Err(TransferError::Status(response.status().as_u16()));
        }

        let data = response.bytes().await?.to_vec();
        debug!(size = data.len(), "Downloaded blob");
        Ok(data)
    }
}

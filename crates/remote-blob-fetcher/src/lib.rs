//! Remote blob fetcher
//!
//! Resolves storage paths into download URLs and downloads the bytes behind
//! them, retrying transient transfer failures with exponential backoff.
//! Fully-qualified URLs skip locator resolution.

pub mod error;
pub mod fetcher;
pub mod locator;
pub mod transfer;
pub mod types;

pub use error::{FetchError, LocatorError, Result, TransferError};
pub use fetcher::{RemoteFetcher, RetryPolicy};
pub use locator::{LocatorResolver, StorageLocatorResolver};
pub use transfer::{BlobTransfer, HttpBlobTransfer};
pub use types::StorageObjectMetadata;

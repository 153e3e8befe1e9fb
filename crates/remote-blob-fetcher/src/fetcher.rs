//! Remote fetch with bounded exponential-backoff retry

use crate::error::{FetchError, LocatorError, Result, TransferError};
use crate::locator::LocatorResolver;
use crate::transfer::BlobTransfer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry budget for a single fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total transfer attempts, including the first one
    pub max_attempts: u32,
    /// Wait after the first failure; doubled after every further failure
    pub initial_delay: Duration,
    /// Wall-clock limit for one transfer attempt
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            attempt_timeout: Some(DEFAULT_ATTEMPT_TIMEOUT),
        }
    }
}

impl RetryPolicy {
    /// Delays slept between consecutive attempts when every attempt fails
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        let attempts = self.max_attempts.max(1);
        let mut delay = self.initial_delay;
        let mut schedule = Vec::with_capacity(attempts as usize - 1);
        for _ in 1..attempts {
            schedule.push(delay);
            delay = delay.saturating_mul(2);
        }
        schedule
    }
}

/// Fetches authoritative bytes for a key from the remote store
///
/// Keys are either fully-qualified `http(s)` URLs, fetched as-is, or paths in
/// the remote blob store, which are first turned into a download URL by the
/// [`LocatorResolver`]. Each call keeps its own backoff state.
pub struct RemoteFetcher {
    resolver: Arc<dyn LocatorResolver>,
    transfer: Arc<dyn BlobTransfer>,
    policy: RetryPolicy,
}

impl RemoteFetcher {
    pub fn new(resolver: Arc<dyn LocatorResolver>, transfer: Arc<dyn BlobTransfer>) -> Self {
        Self {
            resolver,
            transfer,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether `key` is already a directly-fetchable URL
    pub fn is_direct_url(key: &str) -> bool {
        Url::parse(key)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    /// Turn a key into a download URL, asking the backend only for storage paths
    pub async fn resolve_locator(&self, key: &str) -> Result<String> {
        if Self::is_direct_url(key) {
            return Ok(key.to_string());
        }

        let url = self.resolver.resolve_download_url(key).await?;
        debug!(key, "Resolved locator");
        Ok(url)
    }

    /// Fetch the bytes for `key` using the fetcher's retry policy
    pub async fn fetch_with_retry(&self, key: &str) -> Result<Vec<u8>> {
        self.fetch_with_retry_policy(key, &self.policy).await
    }

    /// Fetch the bytes for `key` with an explicit retry policy
    ///
    /// Locator resolution happens once and is never retried. Only transfer
    /// failures consume the attempt budget. The per-attempt timeout also
    /// bounds locator resolution.
    pub async fn fetch_with_retry_policy(&self, key: &str, policy: &RetryPolicy) -> Result<Vec<u8>> {
        let url = match policy.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.resolve_locator(key))
                .await
                .map_err(|_| {
                    warn!(key, timeout_ms = limit.as_millis() as u64, "Locator resolution timed out");
                    FetchError::LocatorUnavailable(LocatorError::Unavailable(format!(
                        "Locator resolution timed out after {:?}",
                        limit
                    )))
                })??,
            None => self.resolve_locator(key).await?,
        };

        let max_attempts = policy.max_attempts.max(1);
        let mut delay = policy.initial_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.attempt(&url, policy.attempt_timeout).await {
                Ok(data) => {
                    if attempt > 1 {
                        info!(key, attempt, "Download succeeded after retry");
                    }
                    return Ok(data);
                }
                Err(err) => {
                    let remaining = max_attempts - attempt;
                    if remaining == 0 {
                        warn!(key, attempts = max_attempts, error = %err, "Download retries exhausted");
                        return Err(FetchError::DownloadExhausted {
                            attempts: max_attempts,
                            last: err,
                        });
                    }

                    warn!(
                        key,
                        attempt,
                        remaining,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Download failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> std::result::Result<Vec<u8>, TransferError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.transfer.download(url))
                .await
                .map_err(|_| TransferError::Timeout(limit))?,
            None => self.transfer.download(url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct StaticResolver {
        calls: AtomicU32,
        found: bool,
        hang: bool,
    }

    impl StaticResolver {
        fn found() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                found: true,
                hang: false,
            })
        }

        fn missing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                found: false,
                hang: false,
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                found: true,
                hang: true,
            })
        }
    }

    #[async_trait]
    impl LocatorResolver for StaticResolver {
        async fn resolve_download_url(
            &self,
            remote_path: &str,
        ) -> std::result::Result<String, LocatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.found {
                Ok(format!("https://storage.test/{}", remote_path))
            } else {
                Err(LocatorError::NotFound(remote_path.to_string()))
            }
        }
    }

    /// Fails the first `failures` downloads, then succeeds
    struct FlakyTransfer {
        failures: u32,
        hang: bool,
        attempts: Mutex<Vec<(Instant, String)>>,
    }

    impl FlakyTransfer {
        fn failing(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                hang: false,
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                failures: u32::MAX,
                hang: true,
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempt_count(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }

        fn gaps(&self) -> Vec<Duration> {
            let attempts = self.attempts.lock().unwrap();
            attempts.windows(2).map(|w| w[1].0 - w[0].0).collect()
        }
    }

    #[async_trait]
    impl BlobTransfer for FlakyTransfer {
        async fn download(&self, url: &str) -> std::result::Result<Vec<u8>, TransferError> {
            let n = {
                let mut attempts = self.attempts.lock().unwrap();
                attempts.push((Instant::now(), url.to_string()));
                attempts.len() as u32
            };
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if n <= self.failures {
                Err(TransferError::Status(503))
            } else {
                Ok(b"jpeg-bytes".to_vec())
            }
        }
    }

    fn policy(max_attempts: u32, initial_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(initial_ms),
            attempt_timeout: None,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(1000));
        assert_eq!(policy.attempt_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_backoff_schedule_doubles() {
        let schedule = policy(5, 1000).backoff_schedule();
        let millis: Vec<u128> = schedule.iter().map(|d| d.as_millis()).collect();
        assert_eq!(millis, vec![1000, 2000, 4000, 8000]);
    }

    #[test]
    fn test_backoff_schedule_single_attempt() {
        assert!(policy(1, 1000).backoff_schedule().is_empty());
        assert!(policy(0, 1000).backoff_schedule().is_empty());
    }

    #[test]
    fn test_is_direct_url() {
        assert!(RemoteFetcher::is_direct_url("https://cdn.example.com/a.jpg"));
        assert!(RemoteFetcher::is_direct_url("http://localhost:9199/a.jpg"));
        assert!(!RemoteFetcher::is_direct_url("photos/a.jpg"));
        assert!(!RemoteFetcher::is_direct_url("/installations/42/front.jpg"));
        assert!(!RemoteFetcher::is_direct_url("gs://bucket/a.jpg"));
    }

    #[tokio::test]
    async fn test_resolve_locator_passes_urls_through() {
        let resolver = StaticResolver::found();
        let fetcher = RemoteFetcher::new(resolver.clone(), FlakyTransfer::failing(0));

        let url = fetcher
            .resolve_locator("https://cdn.example.com/a.jpg")
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.example.com/a.jpg");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_locator_asks_backend_for_paths() {
        let resolver = StaticResolver::found();
        let fetcher = RemoteFetcher::new(resolver.clone(), FlakyTransfer::failing(0));

        let url = fetcher.resolve_locator("photos/a.jpg").await.unwrap();

        assert_eq!(url, "https://storage.test/photos/a.jpg");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_sequence() {
        let transfer = FlakyTransfer::failing(u32::MAX);
        let fetcher =
            RemoteFetcher::new(StaticResolver::found(), transfer.clone()).with_policy(policy(5, 1000));

        let result = fetcher.fetch_with_retry("photos/a.jpg").await;

        match result {
            Err(FetchError::DownloadExhausted { attempts, last }) => {
                assert_eq!(attempts, 5);
                assert!(matches!(last, TransferError::Status(503)));
            }
            other => panic!("Expected DownloadExhausted, got {:?}", other),
        }

        assert_eq!(transfer.attempt_count(), 5);
        let expected = [1000u64, 2000, 4000, 8000];
        let gaps = transfer.gaps();
        assert_eq!(gaps.len(), expected.len());
        for (gap, want) in gaps.iter().zip(expected) {
            let diff = (gap.as_millis() as i128 - want as i128).abs();
            assert!(diff <= 50, "gap {:?} not within tolerance of {}ms", gap, want);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_locator_not_found_short_circuits() {
        let resolver = StaticResolver::missing();
        let transfer = FlakyTransfer::failing(0);
        let fetcher = RemoteFetcher::new(resolver.clone(), transfer.clone());
        let started = Instant::now();

        let result = fetcher.fetch_with_retry("photos/missing.jpg").await;

        assert!(matches!(result, Err(FetchError::LocatorNotFound(ref k)) if k == "photos/missing.jpg"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transfer.attempt_count(), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let transfer = FlakyTransfer::failing(2);
        let fetcher =
            RemoteFetcher::new(StaticResolver::found(), transfer.clone()).with_policy(policy(5, 100));

        let data = fetcher.fetch_with_retry("photos/a.jpg").await.unwrap();

        assert_eq!(data, b"jpeg-bytes");
        assert_eq!(transfer.attempt_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_locator_resolved_once_across_retries() {
        let resolver = StaticResolver::found();
        let transfer = FlakyTransfer::failing(3);
        let fetcher = RemoteFetcher::new(resolver.clone(), transfer.clone()).with_policy(policy(5, 10));

        fetcher.fetch_with_retry("photos/a.jpg").await.unwrap();

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        let attempts = transfer.attempts.lock().unwrap();
        assert!(attempts.iter().all(|(_, url)| url == "https://storage.test/photos/a.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_failure() {
        let transfer = FlakyTransfer::hanging();
        let fetcher = RemoteFetcher::new(StaticResolver::found(), transfer.clone()).with_policy(
            RetryPolicy {
                max_attempts: 2,
                initial_delay: Duration::from_millis(100),
                attempt_timeout: Some(Duration::from_secs(1)),
            },
        );

        let result = fetcher.fetch_with_retry("https://cdn.example.com/slow.jpg").await;

        match result {
            Err(FetchError::DownloadExhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(matches!(last, TransferError::Timeout(d) if d == Duration::from_secs(1)));
            }
            other => panic!("Expected DownloadExhausted, got {:?}", other),
        }
        assert_eq!(transfer.attempt_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_locator_times_out() {
        let resolver = StaticResolver::hanging();
        let transfer = FlakyTransfer::failing(0);
        let fetcher = RemoteFetcher::new(resolver.clone(), transfer.clone()).with_policy(
            RetryPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_millis(100),
                attempt_timeout: Some(Duration::from_secs(5)),
            },
        );
        let started = Instant::now();

        let result = fetcher.fetch_with_retry("photos/a.jpg").await;

        assert!(matches!(
            result,
            Err(FetchError::LocatorUnavailable(LocatorError::Unavailable(_)))
        ));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transfer.attempt_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_policy_override() {
        let transfer = FlakyTransfer::failing(u32::MAX);
        let fetcher = RemoteFetcher::new(StaticResolver::found(), transfer.clone());

        let result = fetcher
            .fetch_with_retry_policy("photos/a.jpg", &policy(2, 10))
            .await;

        assert!(matches!(result, Err(FetchError::DownloadExhausted { attempts: 2, .. })));
        assert_eq!(transfer.attempt_count(), 2);
    }
}

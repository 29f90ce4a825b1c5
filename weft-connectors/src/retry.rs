//! Retrying `find` wrapper
//!
//! Merge queries never retry; a failed fetch drops the datastream from the
//! run. [`RetryingFind`] absorbs transient failures before they get that far.
//! Only the `find` call itself is retried. A feed that breaks after it was
//! handed out still ends the page.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use weft_core::query::{Find, FindRequest, Page};
use weft_core::FetchError;

fn default_max_retries() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_backoff_factor() -> f64 {
    1.2
}
fn default_jitter_ms() -> u64 {
    800
}
fn default_max_delay_ms() -> u64 {
    30_000
}

/// Backoff schedule for [`RetryingFind`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Growth of the delay per retry
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound of the random extra delay
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Cap on the delay before jitter
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            jitter_ms: default_jitter_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the retry count
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the first delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the backoff factor
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the jitter bound
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter_ms = jitter.as_millis() as u64;
        self
    }

    /// Set the delay cap
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Delay before retry number `attempt` (0-based), jitter excluded
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
        let capped = scaled.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let jitter = match self.jitter_ms {
            0 => 0,
            bound => thread_rng().gen_range(0..bound),
        };
        self.base_delay(attempt) + Duration::from_millis(jitter)
    }
}

/// [`Find`] that retries failed calls of an inner `Find`
pub struct RetryingFind<F> {
    inner: F,
    config: RetryConfig,
    retries: AtomicU64,
}

impl<F: Find> RetryingFind<F> {
    /// Wrap `inner`
    pub fn new(inner: F, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            retries: AtomicU64::new(0),
        }
    }

    /// Wrapped collaborator
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Retries issued so far across all calls
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<F: Find> Find for RetryingFind<F> {
    async fn find(&self, request: FindRequest) -> Result<Page, FetchError> {
        let mut attempt = 0;
        loop {
            match self.inner.find(request.clone()).await {
                Ok(page) => return Ok(page),
                Err(err) if attempt >= self.config.max_retries => return Err(err),
                Err(err) => {
                    let delay = self.config.delay(attempt);
                    warn!(
                        "Attempt {}: fetching {} failed ({}), retrying in {:?}",
                        attempt, request.datastream_id, err, delay
                    );
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use weft_core::query::{Datapoint, LowerBound, MemoryFind};

    /// Fails the first `failures` calls, then answers from memory
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        data: MemoryFind,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                data: MemoryFind::new().with_datapoints("ds", vec![Datapoint::scalar(5, 1.0)]),
            }
        }
    }

    #[async_trait]
    impl Find for Flaky {
        async fn find(&self, request: FindRequest) -> Result<Page, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed);
            if call < self.failures {
                return Err(FetchError::Status {
                    status: 503,
                    message: format!("busy {}", call),
                });
            }
            self.data.find(request).await
        }
    }

    fn request() -> FindRequest {
        FindRequest {
            datastream_id: "ds".into(),
            lower: LowerBound::Inclusive(0),
            ends_before: 10,
            limit: 10,
        }
    }

    #[test]
    fn delays_grow_and_cap() {
        let config = RetryConfig::default()
            .initial_delay(Duration::from_millis(1000))
            .backoff_factor(2.0)
            .max_delay(Duration::from_millis(5000));

        assert_eq!(config.base_delay(0), Duration::from_millis(1000));
        assert_eq!(config.base_delay(1), Duration::from_millis(2000));
        assert_eq!(config.base_delay(2), Duration::from_millis(4000));
        assert_eq!(config.base_delay(3), Duration::from_millis(5000));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let config = RetryConfig::default();
        for _ in 0..50 {
            let delay = config.delay(0);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay < Duration::from_millis(1800));
        }
    }

    #[test]
    fn config_defaults_from_empty_json() {
        let config: RetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RetryConfig::default());
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let find = RetryingFind::new(Flaky::new(2), RetryConfig::default());

        let page = find.find(request()).await.unwrap();
        assert!(matches!(page, Page::Batch(records) if records.len() == 1));
        assert_eq!(find.retries(), 2);
        assert_eq!(find.inner().calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_last_error() {
        let find = RetryingFind::new(Flaky::new(10), RetryConfig::default().max_retries(2));

        let err = find.find(request()).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Status {
                status: 503,
                message: "busy 2".into()
            }
        );
        assert_eq!(find.retries(), 2);
    }

    #[tokio::test]
    async fn no_retries_fails_immediately() {
        let find = RetryingFind::new(Flaky::new(1), RetryConfig::none());
        assert!(find.find(request()).await.is_err());
        assert_eq!(find.retries(), 0);
    }
}

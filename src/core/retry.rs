//! Bounded retry of storage calls on rate limiting
//!
//! The store signals overload with `StoreError::RateLimited`. Such calls are
//! retried with a fixed delay until they succeed, the retry count is spent,
//! or the elapsed-time budget runs out; exhaustion surfaces as
//! `BatchError::RetryExpired`. Any other error is returned immediately.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::types::{BatchError, StoreError};

/// Fixed-delay retry policy for rate-limited storage calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retry: u32,
    /// Pause between attempts
    pub delay: Duration,
    /// Give up once this much time has passed, regardless of `max_retry`
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: 3,
            delay: Duration::from_millis(100),
            max_elapsed: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retry: u32, delay: Duration, max_elapsed: Option<Duration>) -> Self {
        Self {
            max_retry,
            delay,
            max_elapsed,
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, None)
    }

    /// Run `op`, retrying it while the store reports rate limiting
    ///
    /// # Arguments
    ///
    /// * `operation` - Name used in logs
    /// * `op` - Factory producing a fresh attempt on every call
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The first successful attempt
    /// * `Err(BatchError::Store)` - A non rate-limit storage error
    /// * `Err(BatchError::RetryExpired)` - After `max_retry + 1` throttled attempts
    ///   or once `max_elapsed` has passed
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, BatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let started = Instant::now();
        let mut retries = 0u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_rate_limited() => {
                    let elapsed = started.elapsed();
                    let budget_spent = self
                        .max_elapsed
                        .map(|max| elapsed >= max)
                        .unwrap_or(false);

                    if retries >= self.max_retry || budget_spent {
                        warn!(
                            operation,
                            retries,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Rate limit retry budget exhausted"
                        );
                        return Err(BatchError::RetryExpired {
                            max_retry: self.max_retry,
                            max_elapsed_millis: self.max_elapsed.map(|d| d.as_millis() as u64),
                            elapsed_millis: (elapsed.as_millis() as u64).max(1),
                        });
                    }

                    retries += 1;
                    debug!(operation, retries, "Store rate limited, retrying");
                    tokio::time::sleep(self.delay).await;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_returns_first_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), None);
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result = policy
            .run("op", move || async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(StoreError::rate_limited("op"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_after_max_retry_plus_one_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(2), Some(Duration::from_secs(5)));
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result: Result<(), BatchError> = policy
            .run("op", move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::rate_limited("op"))
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        match result {
            Err(BatchError::RetryExpired {
                max_retry,
                max_elapsed_millis,
                elapsed_millis,
            }) => {
                assert_eq!(max_retry, 3);
                assert_eq!(max_elapsed_millis, Some(5000));
                assert!(elapsed_millis > 0);
            }
            other => panic!("expected RetryExpired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_elapsed_budget_stops_early() {
        let policy = RetryPolicy::new(
            1_000,
            Duration::from_millis(5),
            Some(Duration::from_millis(20)),
        );
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result: Result<(), BatchError> = policy
            .run("op", move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::rate_limited("op"))
            })
            .await;

        assert!(matches!(result, Err(BatchError::RetryExpired { .. })));
        assert!(attempts.load(Ordering::SeqCst) < 1_000);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result: Result<(), BatchError> = policy
            .run("op", move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Unavailable {
                    message: "down".to_string(),
                })
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(BatchError::Store(StoreError::Unavailable { .. }))
        ));
    }
}

//! Timeout and retry policy for producer calls
//!
//! Every attempt runs under its own timeout. A timed-out attempt is dropped,
//! which cancels only that call.

use council_core::ProducerError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Per-call timeout with a bounded number of attempts and a fixed backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Wall-clock budget for one attempt
    pub timeout: Duration,

    /// Attempts including the first (at least 1)
    pub max_attempts: u32,

    /// Delay between attempts
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_attempts: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl CallPolicy {
    /// Create a new call policy
    pub fn new(timeout: Duration, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Create a policy with a single attempt
    pub fn no_retry(timeout: Duration) -> Self {
        Self::new(timeout, 1, Duration::ZERO)
    }

    /// Upper bound on the time one call can take
    pub fn worst_case(&self) -> Duration {
        self.timeout * self.max_attempts + self.backoff * (self.max_attempts - 1)
    }

    /// Execute an async operation under this policy
    ///
    /// Every error is retried until attempts run out; the last error is
    /// returned. Timeouts surface as [`ProducerError::Timeout`].
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, ProducerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProducerError>>,
    {
        let mut last_error = ProducerError::Failed(format!("{operation_name}: no attempt made"));

        for attempt in 1..=self.max_attempts {
            debug!(
                "Attempt {}/{} for operation: {}",
                attempt, self.max_attempts, operation_name
            );

            let error = match timeout(self.timeout, operation()).await {
                Ok(Ok(result)) => {
                    if attempt > 1 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(result);
                }
                Ok(Err(e)) => e,
                Err(_) => ProducerError::Timeout(self.timeout),
            };

            if attempt < self.max_attempts {
                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation_name, attempt, self.max_attempts, error, self.backoff
                );
                sleep(self.backoff).await;
            } else {
                warn!(
                    "Operation '{}' failed after {} attempts: {}",
                    operation_name, self.max_attempts, error
                );
            }
            last_error = error;
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_worst_case() {
        let policy = CallPolicy::new(Duration::from_secs(10), 2, Duration::from_millis(500));
        assert_eq!(policy.worst_case(), Duration::from_millis(20_500));
        assert_eq!(CallPolicy::new(Duration::from_secs(1), 0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_success_on_second_attempt() {
        let policy = CallPolicy::new(Duration::from_secs(1), 3, Duration::from_millis(1));
        let attempts = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute("flaky", || {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ProducerError::Failed("boom".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_returns_last_error() {
        let policy = CallPolicy::new(Duration::from_secs(1), 2, Duration::ZERO);
        let attempts = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = policy
            .execute("broken", || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    Err(ProducerError::Failed(format!("failure {n}")))
                }
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "failure 1");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let policy = CallPolicy::new(Duration::from_secs(5), 2, Duration::from_millis(500));
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = policy
            .execute("slow", || async {
                sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(ProducerError::Timeout(d)) if d == Duration::from_secs(5)));
        assert_eq!(started.elapsed(), policy.worst_case());
    }
}

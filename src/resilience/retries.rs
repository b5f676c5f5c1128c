//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a failed operation up to `max_attempts` times
//! - Stop at the first error marked non-retryable
//! - Sleep an exponentially growing, jittered delay between attempts
//!
//! # Design Decisions
//! - The strategy holds configuration only; one instance serves many callers
//! - Intermediate failures are swallowed, only the last one surfaces
//! - `CircuitOpen` and `ServiceNotFound` are never retryable, so wrapping a
//!   registry call in a retry stops as soon as the breaker refuses

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::ServiceResult;
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::resilience::timeouts::with_timeout;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    max_attempts: u32,
    backoff: Backoff,
    attempt_timeout: Option<Duration>,
}

impl RetryStrategy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff {
                base_delay_ms: config.base_delay_ms,
                max_delay_ms: config.max_delay_ms,
                exponential_base: config.exponential_base,
                jitter: config.jitter_enabled,
            },
            attempt_timeout: config.attempt_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after failed attempt number `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }

    /// Run `operation` until it succeeds, fails non-retryably, or attempts run out.
    ///
    /// `context` labels log lines and metrics.
    pub async fn execute<T, F, Fut>(&self, context: &str, mut operation: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let mut attempt = 1;
        loop {
            let result = match self.attempt_timeout {
                Some(limit) => with_timeout(limit, context, operation()).await,
                None => operation().await,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(context = %context, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                tracing::debug!(context = %context, attempt, error = %error, "Non-retryable failure");
                return Err(error);
            }

            if attempt >= self.max_attempts {
                tracing::warn!(
                    context = %context,
                    attempts = attempt,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(error);
            }

            let delay = self.calculate_delay(attempt);
            tracing::info!(
                context = %context,
                attempt,
                delay = ?delay,
                error = %error,
                "Retrying operation"
            );
            metrics::record_retry_attempt(context);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ServiceError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn strategy() -> RetryStrategy {
        RetryStrategy::new(&RetryConfig {
            jitter_enabled: false,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = strategy()
            .execute("flaky", move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ServiceError::network("connection reset"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let started = tokio::time::Instant::now();
        let err = strategy()
            .execute("auth", move || {
                c.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(
                        ServiceError::new(ErrorKind::Authentication, "token expired")
                            .with_service("identity"),
                    )
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.message(), "token expired");
        assert_eq!(err.source_service(), Some("identity"));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let started = tokio::time::Instant::now();
        let err = strategy()
            .execute("down", move || {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err::<(), _>(ServiceError::timeout(format!("attempt {}", n))) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.message(), "attempt 3");
        // 1000ms after the first failure, 2000ms after the second.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "slept only {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3100), "slept {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_failure() {
        let retry = RetryStrategy::new(&RetryConfig {
            max_attempts: 2,
            base_delay_ms: 100,
            jitter_enabled: false,
            attempt_timeout_ms: Some(200),
            ..Default::default()
        });
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = retry
            .execute("slow", move || {
                let first = c.fetch_add(1, Ordering::SeqCst) == 0;
                async move {
                    if first {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok(first)
                }
            })
            .await;

        // The hung first attempt is abandoned; the second one answers.
        assert!(!result.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let retry = RetryStrategy::new(&RetryConfig {
            max_attempts: 0,
            ..Default::default()
        });
        assert_eq!(retry.max_attempts(), 1);
    }
}

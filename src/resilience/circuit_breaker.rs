//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a single trial call tests whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first call after next_attempt_at
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails (timer re-armed)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency (not global)
//! - Fail fast in Open state, the operation is never invoked
//! - Half-Open admits exactly one trial; concurrent arrivals get `CircuitOpen`
//! - A cancelled trial releases its slot so the next caller becomes the trial
//! - Outcomes of calls admitted while Closed that land after a trip are
//!   ignored; they neither re-arm the timer nor close the breaker
//! - The state lock is never held across an `.await`

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::clock;
use crate::config::CircuitBreakerConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Read-only view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Epoch milliseconds after which an open breaker admits a trial call.
    pub next_attempt_at: Option<u64>,
    pub failure_threshold: u32,
    pub open_duration_ms: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    next_attempt_at: Option<Instant>,
    next_attempt_at_ms: Option<u64>,
    trial_in_flight: bool,
}

/// How a call got past the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Closed,
    Trial,
}

/// Per-dependency circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                next_attempt_at: None,
                next_attempt_at_ms: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.lock();
        BreakerStatus {
            state: inner.state,
            failure_count: inner.consecutive_failures,
            next_attempt_at: inner.next_attempt_at_ms,
            failure_threshold: self.config.failure_threshold,
            open_duration_ms: self.config.open_duration_ms,
        }
    }

    /// Run `operation` under breaker protection.
    ///
    /// Returns `CircuitOpen` without invoking `operation` when the breaker
    /// refuses. Otherwise the operation's own result is returned unchanged,
    /// after the breaker has recorded it.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> ServiceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let admission = self.admit()?;
        let mut slot = TrialSlot {
            breaker: self,
            armed: admission == Admission::Trial,
        };

        let result = operation().await;
        slot.armed = false;

        match &result {
            Ok(_) => self.on_success(admission),
            Err(e) => self.on_failure(admission, e),
        }
        result
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> ServiceResult<Admission> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Admission::Closed),
            CircuitState::Open => {
                let ready = inner
                    .next_attempt_at
                    .map_or(true, |at| Instant::now() >= at);
                if !ready {
                    drop(inner);
                    return Err(self.reject());
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                drop(inner);
                tracing::info!(service = %self.name, "Circuit half-open, admitting trial call");
                metrics::record_breaker_transition(
                    &self.name,
                    CircuitState::Open.as_str(),
                    CircuitState::HalfOpen.as_str(),
                );
                Ok(Admission::Trial)
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    drop(inner);
                    return Err(self.reject());
                }
                inner.trial_in_flight = true;
                Ok(Admission::Trial)
            }
        }
    }

    fn reject(&self) -> ServiceError {
        tracing::debug!(service = %self.name, "Circuit open, rejecting call");
        metrics::record_breaker_rejection(&self.name);
        metrics::record_call(&self.name, "rejected");
        ServiceError::circuit_open(&self.name)
    }

    fn on_success(&self, admission: Admission) {
        metrics::record_call(&self.name, "success");
        let mut inner = self.lock();
        match admission {
            Admission::Trial => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.next_attempt_at = None;
                inner.next_attempt_at_ms = None;
                inner.trial_in_flight = false;
                drop(inner);
                tracing::info!(service = %self.name, "Trial call succeeded, circuit closed");
                metrics::record_breaker_transition(
                    &self.name,
                    CircuitState::HalfOpen.as_str(),
                    CircuitState::Closed.as_str(),
                );
            }
            Admission::Closed => {
                if inner.state == CircuitState::Closed {
                    inner.consecutive_failures = 0;
                }
            }
        }
    }

    fn on_failure(&self, admission: Admission, error: &ServiceError) {
        metrics::record_call(&self.name, "failure");
        let mut inner = self.lock();
        match admission {
            Admission::Trial => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                inner.trial_in_flight = false;
                self.trip(&mut inner);
                drop(inner);
                tracing::warn!(
                    service = %self.name,
                    error = %error,
                    retry_in_ms = self.config.open_duration_ms,
                    "Trial call failed, circuit re-opened"
                );
                metrics::record_breaker_transition(
                    &self.name,
                    CircuitState::HalfOpen.as_str(),
                    CircuitState::Open.as_str(),
                );
            }
            Admission::Closed => {
                if inner.state != CircuitState::Closed {
                    return;
                }
                inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
                if inner.consecutive_failures < self.config.failure_threshold {
                    return;
                }
                self.trip(&mut inner);
                let failures = inner.consecutive_failures;
                drop(inner);
                tracing::warn!(
                    service = %self.name,
                    failures,
                    error = %error,
                    open_for_ms = self.config.open_duration_ms,
                    "Failure threshold reached, circuit opened"
                );
                metrics::record_breaker_transition(
                    &self.name,
                    CircuitState::Closed.as_str(),
                    CircuitState::Open.as_str(),
                );
            }
        }
    }

    fn trip(&self, inner: &mut BreakerState) {
        inner.state = CircuitState::Open;
        inner.next_attempt_at = Some(Instant::now() + self.config.open_duration());
        inner.next_attempt_at_ms = Some(clock::epoch_millis_after(self.config.open_duration()));
    }
}

/// Releases the half-open trial slot if the trial future is dropped mid-flight.
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().trial_in_flight = false;
            tracing::debug!(service = %self.breaker.name, "Trial call cancelled, slot released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn breaker(threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "orders",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                open_duration_ms: 1000,
            },
        )
    }

    async fn fail(cb: &CircuitBreaker, calls: &AtomicU32) -> ServiceResult<()> {
        cb.execute(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ServiceError::dependency_failure("boom"))
        })
        .await
    }

    async fn succeed(cb: &CircuitBreaker, calls: &AtomicU32) -> ServiceResult<u32> {
        cb.execute(move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_trips_after_threshold_and_fails_fast() {
        let cb = breaker(3);
        let calls = AtomicU32::new(0);

        for i in 1..=3 {
            assert_eq!(cb.state(), CircuitState::Closed, "opened before failure {}", i);
            let err = fail(&cb, &calls).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DependencyFailure);
        }
        let tripped = cb.status();
        assert_eq!(tripped.state, CircuitState::Open);
        assert_eq!(tripped.failure_count, 3);
        assert!(tripped.next_attempt_at.is_some());

        for _ in 0..5 {
            let err = fail(&cb, &calls).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CircuitOpen);
            assert!(!err.is_retryable());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Rejections don't re-arm the timer.
        assert_eq!(cb.status(), tripped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let cb = breaker(3);
        let calls = AtomicU32::new(0);

        let _ = fail(&cb, &calls).await;
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.status().failure_count, 2);

        assert_eq!(succeed(&cb, &calls).await.unwrap(), 42);
        assert_eq!(cb.status().failure_count, 0);

        let _ = fail(&cb, &calls).await;
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_success_closes() {
        let cb = breaker(1);
        let calls = AtomicU32::new(0);
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(
            succeed(&cb, &calls).await.unwrap_err().kind(),
            ErrorKind::CircuitOpen
        );

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(succeed(&cb, &calls).await.unwrap(), 42);

        let status = cb.status();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_count, 0);
        assert_eq!(status.next_attempt_at, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_trial_failure_reopens() {
        let cb = breaker(1);
        let calls = AtomicU32::new(0);
        let _ = fail(&cb, &calls).await;
        let first_deadline = cb.status().next_attempt_at.unwrap();

        tokio::time::advance(Duration::from_millis(1000)).await;
        let err = fail(&cb, &calls).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyFailure);

        let status = cb.status();
        assert_eq!(status.state, CircuitState::Open);
        let deadline = status.next_attempt_at.unwrap();
        assert!(deadline > clock::epoch_millis());
        assert!(deadline >= first_deadline);

        // Fresh timer: the very next call is refused.
        assert_eq!(
            succeed(&cb, &calls).await.unwrap_err().kind(),
            ErrorKind::CircuitOpen
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_trial() {
        let cb = breaker(1);
        let calls = AtomicU32::new(0);
        let _ = fail(&cb, &calls).await;
        tokio::time::advance(Duration::from_millis(1000)).await;

        let counter = &calls;
        let trial = cb.execute(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ServiceError>("recovered")
        });
        let racer = async {
            tokio::task::yield_now().await;
            succeed(&cb, &calls).await
        };

        let (trial, racer) = tokio::join!(trial, racer);
        assert_eq!(trial.unwrap(), "recovered");
        assert_eq!(racer.unwrap_err().kind(), ErrorKind::CircuitOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_trial_releases_slot() {
        let cb = breaker(1);
        let calls = AtomicU32::new(0);
        let _ = fail(&cb, &calls).await;
        tokio::time::advance(Duration::from_millis(1000)).await;

        let hung = cb.execute(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ServiceError>(())
        });
        assert!(tokio::time::timeout(Duration::from_millis(10), hung)
            .await
            .is_err());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert_eq!(succeed(&cb, &calls).await.unwrap(), 42);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_outcome_after_trip_is_ignored() {
        let cb = breaker(1);
        let calls = AtomicU32::new(0);

        let slow_success = cb.execute(|| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ServiceError>(())
        });
        let quick_failure = async {
            tokio::task::yield_now().await;
            fail(&cb, &calls).await
        };

        let (slow, quick) = tokio::join!(slow_success, quick_failure);
        assert!(slow.is_ok());
        assert!(quick.is_err());
        // The success admitted before the trip does not close the breaker.
        assert_eq!(cb.state(), CircuitState::Open);
    }
}

//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use service_resilience::config::{CircuitBreakerConfig, RetryConfig};
use service_resilience::{ServiceError, ServiceResult};

/// An operation that fails `failures` times with `error`, then succeeds.
#[derive(Clone)]
pub struct FlakyOperation {
    calls: Arc<AtomicU32>,
    failures: u32,
    error: ServiceError,
}

impl FlakyOperation {
    pub fn new(failures: u32, error: ServiceError) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            error,
        }
    }

    /// Never succeeds.
    #[allow(dead_code)]
    pub fn always_failing(error: ServiceError) -> Self {
        Self::new(u32::MAX, error)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn call(&self) -> ServiceResult<&'static str> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(self.error.clone())
        } else {
            Ok("ok")
        }
    }
}

/// Breaker settings with a short open window.
#[allow(dead_code)]
pub fn fast_breaker(failure_threshold: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        open_duration_ms: 1000,
    }
}

/// Retry settings without jitter so elapsed time can be asserted.
#[allow(dead_code)]
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay_ms: 100,
        max_delay_ms: 1000,
        exponential_base: 2.0,
        jitter_enabled: false,
        attempt_timeout_ms: None,
    }
}

/// Start a listener that accepts and immediately drops connections.
#[allow(dead_code)]
pub async fn start_accepting_listener() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Sleep for `ms` then succeed, holding whatever slot the caller occupies.
#[allow(dead_code)]
pub async fn hold_for(ms: u64) -> ServiceResult<u64> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(ms)
}

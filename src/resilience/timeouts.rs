//! Timeout enforcement.
//!
//! A timed-out future is dropped, so any late result it would have produced
//! is discarded. The caller sees a retryable `Timeout` error.

use std::future::Future;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

/// Run `fut` with a deadline, mapping expiry to a `Timeout` error.
pub async fn with_timeout<T, Fut>(limit: Duration, what: &str, fut: Fut) -> ServiceResult<T>
where
    Fut: Future<Output = ServiceResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::timeout(format!(
            "{} timed out after {}ms",
            what,
            limit.as_millis()
        ))),
    }
}

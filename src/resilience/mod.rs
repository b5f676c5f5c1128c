//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a dependency:
//!     → bulkhead.rs (take a pool slot or reject with ResourceExhaustion)
//!     → retries.rs (re-run retryable failures with backoff.rs delays)
//!     → timeouts.rs (optional per-attempt deadline)
//!     → circuit_breaker.rs (fail fast while the dependency is known bad)
//! ```
//!
//! # Design Decisions
//! - Each primitive wraps an operation closure and can be used alone
//! - Composition order is the caller's choice
//! - No primitive swallows errors except retries, which surface the last one

pub mod backoff;
pub mod bulkhead;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use bulkhead::{Bulkhead, BulkheadPool, PoolPermit, PoolStatus};
pub use circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitState};
pub use retries::RetryStrategy;

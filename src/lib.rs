//! Resilience coordination for calls to downstream dependencies.
//!
//! # Architecture Overview
//!
//! ```text
//!   application code
//!        │
//!        ▼
//!   ┌──────────────────────────────────────────────────────────┐
//!   │  bulkhead (optional)  →  retry (optional)                 │
//!   │        │                                                  │
//!   │        ▼                                                  │
//!   │  ServiceRegistry::call_service(name, op)                  │
//!   │        │                                                  │
//!   │        ▼                                                  │
//!   │  CircuitBreaker (one per dependency) ──▶ op() ──▶ remote  │
//!   └──────────────────────────────────────────────────────────┘
//!
//!   ServiceHealthMonitor ── timer ──▶ probes ──▶ records / alerts
//! ```
//!
//! The registry, bulkhead, retry strategy and monitor are plain values owned
//! by the process; nothing is global.

pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;

pub use config::schema::ResilienceConfig;
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use health::ServiceHealthMonitor;
pub use lifecycle::Shutdown;
pub use registry::ServiceRegistry;
pub use resilience::{Bulkhead, CircuitBreaker, RetryStrategy};

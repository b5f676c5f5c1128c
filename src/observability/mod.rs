//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, retries, pools and the health monitor produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON optional) for machine parsing
//! - Metrics are cheap and no-ops when no exporter is installed

pub mod logging;
pub mod metrics;

//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (monitor.rs):
//!     Periodic timer
//!     → Probe each dependency (probe.rs), raced against a timeout
//!     → Update per-service record (state.rs)
//!     → Unhealthy critical dependencies → alert.rs
//! ```
//!
//! # Design Decisions
//! - Runs outside the request path; breakers never read health records
//! - Probes run concurrently and are recorded independently
//! - Health state is per-dependency

pub mod alert;
pub mod monitor;
pub mod probe;
pub mod state;

pub use alert::{Alert, AlertLevel, AlertSink, TracingAlertSink};
pub use monitor::ServiceHealthMonitor;
pub use probe::{HealthProbe, TcpProbe};
pub use state::{HealthCheckResult, HealthStatus, MonitorOptions, ServiceHealthStatus};

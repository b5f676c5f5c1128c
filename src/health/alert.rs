//! Alerting collaborator.
//!
//! The monitor hands every alert to an [`AlertSink`]. The default sink writes
//! them to the log with an `alert` field so log pipelines can route on it.

use serde::Serialize;

use crate::observability::metrics;

/// Severity of a monitor alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// A critical dependency is unhealthy.
    Critical,
    /// A non-critical dependency reached its failure tolerance.
    Sustained,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Critical => "critical",
            AlertLevel::Sustained => "sustained",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub service: String,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// Receives alerts raised by the health monitor.
pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: &Alert);
}

/// Logs alerts through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn raise(&self, alert: &Alert) {
        match alert.level {
            AlertLevel::Critical => {
                metrics::record_critical_alert(&alert.service);
                tracing::error!(
                    alert = alert.level.as_str(),
                    service = %alert.service,
                    consecutive_failures = alert.consecutive_failures,
                    last_error = ?alert.last_error,
                    "CRITICAL: dependency unhealthy"
                );
            }
            AlertLevel::Sustained => {
                tracing::warn!(
                    alert = alert.level.as_str(),
                    service = %alert.service,
                    consecutive_failures = alert.consecutive_failures,
                    last_error = ?alert.last_error,
                    "Dependency failing repeatedly"
                );
            }
        }
    }
}

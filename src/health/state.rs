//! Per-service health records.
//!
//! # States
//! - Unknown: never probed
//! - Healthy: last probe succeeded
//! - Unhealthy: last probe failed or timed out
//!
//! # Design Decisions
//! - Status follows the latest probe; `consecutive_failures` carries the history
//! - Records are mutated only by the monitor's check routine
//! - `success_rate` is derived on read, 0 before the first check

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Health state of a monitored dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

/// Registration options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorOptions {
    pub max_consecutive_failures: u32,
    pub is_critical: bool,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            is_critical: false,
        }
    }
}

impl MonitorOptions {
    pub fn critical() -> Self {
        Self {
            is_critical: true,
            ..Default::default()
        }
    }
}

/// Mutable health history, guarded by the monitor.
#[derive(Debug, Clone, Default)]
pub(crate) struct HealthRecord {
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub last_check_at: Option<u64>,
    pub last_success_at: Option<u64>,
    pub last_failure_at: Option<u64>,
    pub last_response_time_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl HealthRecord {
    pub fn record_success(&mut self, at: u64, response_time_ms: u64) {
        self.status = HealthStatus::Healthy;
        self.consecutive_failures = 0;
        self.total_checks += 1;
        self.successful_checks += 1;
        self.last_check_at = Some(at);
        self.last_success_at = Some(at);
        self.last_response_time_ms = Some(response_time_ms);
    }

    pub fn record_failure(&mut self, at: u64, response_time_ms: u64, error: &ServiceError) {
        self.status = HealthStatus::Unhealthy;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.total_checks += 1;
        self.last_check_at = Some(at);
        self.last_failure_at = Some(at);
        self.last_response_time_ms = Some(response_time_ms);
        self.last_error = Some(error.to_string());
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.successful_checks as f64 / self.total_checks as f64
        }
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub checked_at: u64,
    pub error: Option<String>,
}

impl HealthCheckResult {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Read-only view of a monitored dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealthStatus {
    pub name: String,
    pub status: HealthStatus,
    pub is_critical: bool,
    pub max_consecutive_failures: u32,
    pub consecutive_failures: u32,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub success_rate: f64,
    pub last_check_at: Option<u64>,
    pub last_success_at: Option<u64>,
    pub last_failure_at: Option<u64>,
    pub last_response_time_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl ServiceHealthStatus {
    pub(crate) fn from_record(name: &str, options: MonitorOptions, record: &HealthRecord) -> Self {
        Self {
            name: name.to_string(),
            status: record.status,
            is_critical: options.is_critical,
            max_consecutive_failures: options.max_consecutive_failures,
            consecutive_failures: record.consecutive_failures,
            total_checks: record.total_checks,
            successful_checks: record.successful_checks,
            success_rate: record.success_rate(),
            last_check_at: record.last_check_at,
            last_success_at: record.last_success_at,
            last_failure_at: record.last_failure_at,
            last_response_time_ms: record.last_response_time_ms,
            last_error: record.last_error.clone(),
        }
    }
}

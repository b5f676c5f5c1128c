//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! resilience layer. All types derive Serde traits for deserialization from
//! config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Breaker defaults applied to every registered service.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry strategy settings.
    pub retry: RetryConfig,

    /// Health monitor settings.
    pub health_monitor: HealthMonitorConfig,

    /// Bulkhead pools.
    pub bulkhead: BulkheadConfig,

    /// Downstream dependencies.
    pub services: Vec<ServiceDefinition>,
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,

    /// How long the breaker stays open before allowing a trial call, in milliseconds.
    pub open_duration_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration_ms: 60_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor between attempts.
    pub exponential_base: f64,

    /// Randomize delays by ±25%.
    pub jitter_enabled: bool,

    /// Optional deadline for each individual attempt, in milliseconds.
    pub attempt_timeout_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            exponential_base: 2.0,
            jitter_enabled: true,
            attempt_timeout_ms: None,
        }
    }
}

/// Health monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct HealthMonitorConfig {
    /// Enable the background probe loop.
    pub enabled: bool,

    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Deadline for a single probe in milliseconds.
    pub probe_timeout_ms: u64,
}

impl HealthMonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            probe_timeout_ms: 5_000,
        }
    }
}

/// Bulkhead configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BulkheadConfig {
    pub pools: Vec<PoolConfig>,
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        Self {
            pools: vec![
                PoolConfig {
                    name: "critical".to_string(),
                    max_concurrent: 10,
                },
                PoolConfig {
                    name: "non-critical".to_string(),
                    max_concurrent: 5,
                },
            ],
        }
    }
}

/// A single bulkhead pool.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Pool identifier.
    pub name: String,

    /// Maximum operations in flight at once.
    pub max_concurrent: usize,
}

/// A downstream dependency as declared in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// Unique service identifier.
    pub name: String,

    #[serde(flatten)]
    pub config: ServiceConfig,

    /// Alert loudly when this service is unhealthy.
    #[serde(default)]
    pub critical: bool,

    /// Consecutive failed probes tolerated before a sustained-failure warning.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

/// Static descriptor stored in the registry alongside the breaker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Endpoint URL (e.g., "http://127.0.0.1:3000/health").
    pub endpoint: String,

    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Per-service breaker override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

impl ServiceConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            description: None,
            circuit_breaker: None,
        }
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(config);
        self
    }
}

fn default_max_consecutive_failures() -> u32 {
    3
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

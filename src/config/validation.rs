//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, timeouts > 0)
//! - Detect duplicate service and pool names
//! - Check that service endpoints are parseable URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{CircuitBreakerConfig, ResilienceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    #[error("retry.exponential_base must be greater than 1")]
    ExponentialBaseTooSmall,

    #[error("retry.max_delay_ms ({max}) is smaller than retry.base_delay_ms ({base})")]
    MaxDelayBelowBase { base: u64, max: u64 },

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("duplicate bulkhead pool name '{0}'")]
    DuplicatePool(String),

    #[error("service '{name}' has an invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        name: String,
        endpoint: String,
        reason: String,
    },
}

fn positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
}

fn check_breaker(errors: &mut Vec<ValidationError>, prefix: &str, config: &CircuitBreakerConfig) {
    positive(
        errors,
        &format!("{}.failure_threshold", prefix),
        config.failure_threshold as u64,
    );
    positive(
        errors,
        &format!("{}.open_duration_ms", prefix),
        config.open_duration_ms,
    );
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_breaker(&mut errors, "circuit_breaker", &config.circuit_breaker);

    let retry = &config.retry;
    positive(&mut errors, "retry.max_attempts", retry.max_attempts as u64);
    if retry.exponential_base.is_nan() || retry.exponential_base <= 1.0 {
        errors.push(ValidationError::ExponentialBaseTooSmall);
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(ValidationError::MaxDelayBelowBase {
            base: retry.base_delay_ms,
            max: retry.max_delay_ms,
        });
    }
    if let Some(timeout) = retry.attempt_timeout_ms {
        positive(&mut errors, "retry.attempt_timeout_ms", timeout);
    }

    positive(
        &mut errors,
        "health_monitor.interval_ms",
        config.health_monitor.interval_ms,
    );
    positive(
        &mut errors,
        "health_monitor.probe_timeout_ms",
        config.health_monitor.probe_timeout_ms,
    );

    let mut pools = HashSet::new();
    for pool in &config.bulkhead.pools {
        if !pools.insert(pool.name.as_str()) {
            errors.push(ValidationError::DuplicatePool(pool.name.clone()));
        }
        positive(
            &mut errors,
            &format!("bulkhead.pools.{}.max_concurrent", pool.name),
            pool.max_concurrent as u64,
        );
    }

    let mut services = HashSet::new();
    for service in &config.services {
        if !services.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if let Err(e) = Url::parse(&service.config.endpoint) {
            errors.push(ValidationError::InvalidEndpoint {
                name: service.name.clone(),
                endpoint: service.config.endpoint.clone(),
                reason: e.to_string(),
            });
        }
        if let Some(breaker) = &service.config.circuit_breaker {
            check_breaker(
                &mut errors,
                &format!("services.{}.circuit_breaker", service.name),
                breaker,
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! A registered dependency and its breaker.

use serde::Serialize;

use crate::config::{CircuitBreakerConfig, ServiceConfig};
use crate::resilience::circuit_breaker::{BreakerStatus, CircuitBreaker};

/// Registry entry. The breaker is owned here and nowhere else.
#[derive(Debug)]
pub struct ServiceEntry {
    name: String,
    config: ServiceConfig,
    breaker: CircuitBreaker,
}

/// Config plus breaker state for one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub config: ServiceConfig,
    pub breaker: BreakerStatus,
}

impl ServiceEntry {
    pub fn new(name: &str, config: ServiceConfig, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            breaker: CircuitBreaker::new(name, breaker_config),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            name: self.name.clone(),
            config: self.config.clone(),
            breaker: self.breaker.status(),
        }
    }
}

//! Service registry.
//!
//! # Data Flow
//! ```text
//! application code
//!     → ServiceRegistry::call_service(name, operation)
//!     → lookup entry (ServiceNotFound if absent)
//!     → entry.breaker.execute(operation)
//!     → result or ServiceError, exactly as the breaker returns it
//! ```
//!
//! # Design Decisions
//! - Explicit object owned by the process and passed by reference; no globals
//! - One breaker per service name, created at registration
//! - Duplicate registration is an error, entries are never overwritten
//! - Status snapshots are ordered by name so repeated reads compare equal

pub mod entry;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use crate::config::{CircuitBreakerConfig, ResilienceConfig, ServiceConfig};
use crate::error::{ServiceError, ServiceResult};

pub use entry::{ServiceEntry, ServiceStatus};

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("service '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Maps dependency names to their breaker-protected entries.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<ServiceEntry>>,
    breaker_defaults: CircuitBreakerConfig,
}

impl ServiceRegistry {
    /// Create an empty registry whose breakers use `breaker_defaults` unless
    /// a service overrides them.
    pub fn new(breaker_defaults: CircuitBreakerConfig) -> Self {
        Self {
            services: DashMap::new(),
            breaker_defaults,
        }
    }

    /// Build a registry holding every service in `config`.
    pub fn from_config(config: &ResilienceConfig) -> Result<Self, RegistryError> {
        let registry = Self::new(config.circuit_breaker);
        for service in &config.services {
            registry.register(&service.name, service.config.clone())?;
        }
        Ok(registry)
    }

    /// Register `name` with a fresh breaker.
    pub fn register(&self, name: &str, config: ServiceConfig) -> Result<(), RegistryError> {
        match self.services.entry(name.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(name.to_string())),
            Entry::Vacant(slot) => {
                let breaker_config = config.circuit_breaker.unwrap_or(self.breaker_defaults);
                tracing::info!(
                    service = %name,
                    endpoint = %config.endpoint,
                    failure_threshold = breaker_config.failure_threshold,
                    open_duration_ms = breaker_config.open_duration_ms,
                    "Service registered"
                );
                slot.insert(Arc::new(ServiceEntry::new(name, config, breaker_config)));
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServiceEntry>> {
        self.services.get(name).map(|e| e.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Registered names, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Call `name` through its circuit breaker.
    pub async fn call_service<T, F, Fut>(&self, name: &str, operation: F) -> ServiceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        // The map guard must be gone before the operation is awaited.
        let entry = match self.get(name) {
            Some(entry) => entry,
            None => {
                tracing::error!(service = %name, "Call to unregistered service");
                return Err(ServiceError::service_not_found(name));
            }
        };
        entry.breaker().execute(operation).await
    }

    pub fn service_status(&self, name: &str) -> Option<ServiceStatus> {
        self.get(name).map(|entry| entry.status())
    }

    pub fn all_services_status(&self) -> BTreeMap<String, ServiceStatus> {
        self.services
            .iter()
            .map(|e| (e.key().clone(), e.value().status()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::resilience::circuit_breaker::CircuitState;

    fn registry() -> ServiceRegistry {
        let registry = ServiceRegistry::new(CircuitBreakerConfig {
            failure_threshold: 2,
            open_duration_ms: 5_000,
        });
        registry
            .register("users", ServiceConfig::new("http://127.0.0.1:4001"))
            .unwrap();
        registry
            .register(
                "billing",
                ServiceConfig::new("http://127.0.0.1:4002").with_circuit_breaker(
                    CircuitBreakerConfig {
                        failure_threshold: 1,
                        open_duration_ms: 1_000,
                    },
                ),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = registry();
        let err = registry
            .register("users", ServiceConfig::new("http://elsewhere:1"))
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered("users".into()));
        // Original entry untouched.
        assert_eq!(
            registry.service_status("users").unwrap().config.endpoint,
            "http://127.0.0.1:4001"
        );
        assert_eq!(registry.service_names(), vec!["billing", "users"]);
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let registry = registry();
        let err = registry
            .call_service("ghost", || async { Ok(()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceNotFound);
        assert_eq!(err.source_service(), Some("ghost"));
    }

    #[tokio::test]
    async fn test_calls_go_through_the_right_breaker() {
        let registry = registry();

        let value = registry
            .call_service("users", || async { Ok::<_, ServiceError>("alice") })
            .await
            .unwrap();
        assert_eq!(value, "alice");

        let err = registry
            .call_service("billing", || async {
                Err::<(), _>(ServiceError::dependency_failure("ledger offline").with_service("billing"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.message(), "ledger offline");

        let status = registry.all_services_status();
        assert_eq!(status["billing"].breaker.state, CircuitState::Open);
        assert_eq!(status["billing"].breaker.failure_threshold, 1);
        assert_eq!(status["users"].breaker.state, CircuitState::Closed);
        assert_eq!(status["users"].breaker.failure_threshold, 2);
    }

    #[tokio::test]
    async fn test_status_snapshots_are_stable() {
        let registry = registry();
        let _ = registry
            .call_service("billing", || async {
                Err::<(), _>(ServiceError::timeout("slow"))
            })
            .await;

        let first = registry.all_services_status();
        let second = registry.all_services_status();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_from_config() {
        let config: ResilienceConfig = toml::from_str(
            r#"
            [[services]]
            name = "search"
            endpoint = "http://127.0.0.1:9200"
            "#,
        )
        .unwrap();
        let registry = ServiceRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.service_status("search").unwrap().breaker.failure_threshold,
            5
        );
    }
}

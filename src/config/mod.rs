//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → handed to registry, bulkhead, retry strategy and health monitor
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BulkheadConfig;
pub use schema::CircuitBreakerConfig;
pub use schema::HealthMonitorConfig;
pub use schema::ObservabilityConfig;
pub use schema::PoolConfig;
pub use schema::ResilienceConfig;
pub use schema::RetryConfig;
pub use schema::ServiceConfig;
pub use schema::ServiceDefinition;

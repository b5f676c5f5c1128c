//! Categorized failures produced by dependency calls.
//!
//! Every failure that crosses this crate's boundary is a [`ServiceError`].
//! The [`ErrorKind`] carries a default retryability; callers that know better
//! (pool exhaustion vs. disk exhaustion, for instance) override it at
//! construction time.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Timeout,
    Network,
    Authentication,
    Authorization,
    Validation,
    BusinessLogic,
    ResourceExhaustion,
    DependencyFailure,
    DataCorruption,
    RateLimit,
    /// A circuit breaker refused the call without invoking the dependency.
    CircuitOpen,
    /// The named dependency was never registered.
    ServiceNotFound,
    /// The named bulkhead pool does not exist.
    UnknownPool,
}

impl ErrorKind {
    /// Retryability assumed when the caller doesn't say otherwise.
    ///
    /// `ResourceExhaustion` defaults to non-retryable (storage); pool
    /// exhaustion goes through [`ServiceError::pool_exhausted`] instead.
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::Network
                | ErrorKind::DependencyFailure
                | ErrorKind::RateLimit
        )
    }

    /// Nominal HTTP-style status code reported alongside the error.
    pub fn default_status_code(self) -> u16 {
        match self {
            ErrorKind::Timeout => 504,
            ErrorKind::Network => 502,
            ErrorKind::Authentication => 401,
            ErrorKind::Authorization => 403,
            ErrorKind::Validation => 400,
            ErrorKind::BusinessLogic => 422,
            ErrorKind::ResourceExhaustion => 503,
            ErrorKind::DependencyFailure => 502,
            ErrorKind::DataCorruption => 500,
            ErrorKind::RateLimit => 429,
            ErrorKind::CircuitOpen => 503,
            ErrorKind::ServiceNotFound => 404,
            ErrorKind::UnknownPool => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Authentication => "AUTHENTICATION",
            ErrorKind::Authorization => "AUTHORIZATION",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::BusinessLogic => "BUSINESS_LOGIC",
            ErrorKind::ResourceExhaustion => "RESOURCE_EXHAUSTION",
            ErrorKind::DependencyFailure => "DEPENDENCY_FAILURE",
            ErrorKind::DataCorruption => "DATA_CORRUPTION",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::CircuitOpen => "CIRCUIT_OPEN",
            ErrorKind::ServiceNotFound => "SERVICE_NOT_FOUND",
            ErrorKind::UnknownPool => "UNKNOWN_POOL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed dependency call.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    kind: ErrorKind,
    message: String,
    source_service: Option<String>,
    retryable: bool,
    status_code: u16,
    timestamp: SystemTime,
}

impl ServiceError {
    /// Create an error using the kind's default retryability and status code.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source_service: None,
            retryable: kind.default_retryable(),
            status_code: kind.default_status_code(),
            timestamp: SystemTime::now(),
        }
    }

    /// Tag the error with the dependency it came from.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.source_service = Some(service.into());
        self
    }

    /// Override the default retryability.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn dependency_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DependencyFailure, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Breaker rejection. Never retryable: the breaker will keep refusing.
    pub fn circuit_open(service: &str) -> Self {
        Self::new(
            ErrorKind::CircuitOpen,
            format!("circuit breaker is open for service '{}'", service),
        )
        .with_service(service)
        .with_retryable(false)
    }

    pub fn service_not_found(service: &str) -> Self {
        Self::new(
            ErrorKind::ServiceNotFound,
            format!("service '{}' is not registered", service),
        )
        .with_service(service)
        .with_retryable(false)
    }

    /// Bulkhead rejection. Retryable: capacity frees up once in-flight work drains.
    pub fn pool_exhausted(pool: &str, max_concurrent: usize) -> Self {
        Self::new(
            ErrorKind::ResourceExhaustion,
            format!("bulkhead pool '{}' is full ({} in flight)", pool, max_concurrent),
        )
        .with_retryable(true)
    }

    pub fn unknown_pool(pool: &str) -> Self {
        Self::new(
            ErrorKind::UnknownPool,
            format!("bulkhead pool '{}' is not configured", pool),
        )
        .with_retryable(false)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_service(&self) -> Option<&str> {
        self.source_service.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

/// Result alias used throughout the crate.
pub type ServiceResult<T> = Result<T, ServiceError>;

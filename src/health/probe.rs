//! Health probes.
//!
//! Any `Fn() -> Future<Output = ServiceResult<()>>` closure is a probe.
//! [`TcpProbe`] checks that a service endpoint accepts TCP connections.

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::net::TcpStream;
use url::Url;

use crate::error::{ServiceError, ServiceResult};

/// An out-of-band check of a dependency.
pub trait HealthProbe: Send + Sync + 'static {
    fn check(&self) -> BoxFuture<'static, ServiceResult<()>>;
}

impl<F, Fut> HealthProbe for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ServiceResult<()>> + Send + 'static,
{
    fn check(&self) -> BoxFuture<'static, ServiceResult<()>> {
        (self)().boxed()
    }
}

/// Connects to `host:port` and immediately drops the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpProbe {
    address: String,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Derive the target from an endpoint URL, using the scheme's default port
    /// when none is given.
    pub fn from_endpoint(endpoint: &str) -> ServiceResult<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| ServiceError::validation(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| ServiceError::validation(format!("endpoint '{}' has no host", endpoint)))?;
        let port = url.port_or_known_default().ok_or_else(|| {
            ServiceError::validation(format!("endpoint '{}' has no port", endpoint))
        })?;
        Ok(Self::new(format!("{}:{}", host, port)))
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl HealthProbe for TcpProbe {
    fn check(&self) -> BoxFuture<'static, ServiceResult<()>> {
        let address = self.address.clone();
        async move {
            TcpStream::connect(&address)
                .await
                .map(drop)
                .map_err(|e| ServiceError::network(format!("connect to {} failed: {}", address, e)))
        }
        .boxed()
    }
}

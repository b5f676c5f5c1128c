//! Service resilience daemon.
//!
//! Loads a TOML configuration, registers every declared dependency behind a
//! circuit breaker, probes their endpoints on a timer and prints a JSON status
//! report on Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;

use service_resilience::config::loader::load_config;
use service_resilience::health::{MonitorOptions, TcpProbe};
use service_resilience::observability::{logging, metrics};
use service_resilience::{
    Bulkhead, ResilienceConfig, ServiceHealthMonitor, ServiceRegistry, Shutdown,
};

#[derive(Parser, Debug)]
#[command(name = "service-resilience", version, about = "Resilience coordinator for downstream dependencies")]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ResilienceConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!("service-resilience v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        services = config.services.len(),
        pools = config.bulkhead.pools.len(),
        health_interval_ms = config.health_monitor.interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let registry = ServiceRegistry::from_config(&config)?;
    let bulkhead = Bulkhead::from_config(&config.bulkhead);
    let monitor = Arc::new(ServiceHealthMonitor::new(config.health_monitor.clone()));

    for service in &config.services {
        match TcpProbe::from_endpoint(&service.config.endpoint) {
            Ok(probe) => {
                let options = MonitorOptions {
                    max_consecutive_failures: service.max_consecutive_failures,
                    is_critical: service.critical,
                };
                monitor.register(&service.name, probe, options);
            }
            Err(e) => {
                tracing::warn!(
                    service = %service.name,
                    endpoint = %service.config.endpoint,
                    error = %e,
                    "Endpoint cannot be probed, skipping health monitoring"
                );
            }
        }
    }

    let shutdown = Shutdown::new();
    let monitor_handle = monitor.spawn(shutdown.subscribe());

    shutdown.trigger_on_ctrl_c().await?;

    if let Err(e) = monitor_handle.await {
        tracing::error!(error = %e, "Health monitor task failed");
    }

    let report = json!({
        "services": registry.all_services_status(),
        "health": monitor.all_services_status(),
        "pools": bulkhead.all_pools_status(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!("Shutdown complete");
    Ok(())
}

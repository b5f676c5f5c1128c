//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered dependency
//! - Race each probe against the configured timeout
//! - Record outcomes independently so one bad probe never hides another
//! - Raise alerts for unhealthy critical dependencies

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::clock;
use crate::config::HealthMonitorConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::health::alert::{Alert, AlertLevel, AlertSink, TracingAlertSink};
use crate::health::probe::HealthProbe;
use crate::health::state::{
    HealthCheckResult, HealthRecord, HealthStatus, MonitorOptions, ServiceHealthStatus,
};
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;

struct MonitoredService {
    probe: Arc<dyn HealthProbe>,
    options: MonitorOptions,
    record: Mutex<HealthRecord>,
}

impl MonitoredService {
    fn record(&self) -> MutexGuard<'_, HealthRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Probes dependencies on a timer, outside the request path.
pub struct ServiceHealthMonitor {
    config: HealthMonitorConfig,
    services: DashMap<String, Arc<MonitoredService>>,
    alerts: Arc<dyn AlertSink>,
}

impl ServiceHealthMonitor {
    pub fn new(config: HealthMonitorConfig) -> Self {
        Self::with_alert_sink(config, Arc::new(TracingAlertSink))
    }

    pub fn with_alert_sink(config: HealthMonitorConfig, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            config,
            services: DashMap::new(),
            alerts,
        }
    }

    pub fn config(&self) -> &HealthMonitorConfig {
        &self.config
    }

    /// Start monitoring `name`. Re-registering replaces the probe and resets history.
    ///
    /// A check of the old probe that is still running when the replacement
    /// lands records into the discarded history, so its outcome is dropped.
    pub fn register<P>(&self, name: &str, probe: P, options: MonitorOptions)
    where
        P: HealthProbe,
    {
        let service = Arc::new(MonitoredService {
            probe: Arc::new(probe),
            options,
            record: Mutex::new(HealthRecord::default()),
        });
        if self.services.insert(name.to_string(), service).is_some() {
            tracing::warn!(service = %name, "Health probe replaced");
        } else {
            tracing::info!(
                service = %name,
                critical = options.is_critical,
                max_consecutive_failures = options.max_consecutive_failures,
                "Health probe registered"
            );
        }
    }

    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Probe `name` once and record the outcome.
    pub async fn check_service_health(&self, name: &str) -> ServiceResult<HealthCheckResult> {
        let service = self
            .services
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| ServiceError::service_not_found(name))?;
        Ok(self.run_check(name, &service).await)
    }

    async fn run_check(&self, name: &str, service: &MonitoredService) -> HealthCheckResult {
        let started = Instant::now();
        // A panicking probe is recorded as a failure instead of unwinding
        // through the round and killing the monitor task.
        let guarded = AssertUnwindSafe(async { service.probe.check().await })
            .catch_unwind()
            .map(|caught| {
                caught.unwrap_or_else(|payload| {
                    let reason = panic_message(payload.as_ref());
                    tracing::error!(service = %name, panic = %reason, "Health probe panicked");
                    Err(ServiceError::dependency_failure(format!(
                        "health probe panicked: {}",
                        reason
                    )))
                })
            });
        let outcome = with_timeout(
            self.config.probe_timeout(),
            &format!("health probe for '{}'", name),
            guarded,
        )
        .await;
        let elapsed = started.elapsed();
        let response_time_ms = elapsed.as_millis() as u64;
        let checked_at = clock::epoch_millis();

        metrics::record_health_check(name, outcome.is_ok(), elapsed);

        let mut record = service.record();
        match outcome {
            Ok(()) => {
                let recovered = record.status == HealthStatus::Unhealthy;
                record.record_success(checked_at, response_time_ms);
                drop(record);
                if recovered {
                    tracing::info!(service = %name, response_time_ms, "Service recovered");
                } else {
                    tracing::debug!(service = %name, response_time_ms, "Health check passed");
                }
                HealthCheckResult {
                    name: name.to_string(),
                    status: HealthStatus::Healthy,
                    response_time_ms,
                    checked_at,
                    error: None,
                }
            }
            Err(e) => {
                record.record_failure(checked_at, response_time_ms, &e);
                let failures = record.consecutive_failures;
                drop(record);
                tracing::warn!(
                    service = %name,
                    consecutive_failures = failures,
                    error = %e,
                    "Health check failed"
                );
                HealthCheckResult {
                    name: name.to_string(),
                    status: HealthStatus::Unhealthy,
                    response_time_ms,
                    checked_at,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Probe every service concurrently.
    pub async fn check_all_services(&self) -> BTreeMap<String, HealthCheckResult> {
        // Snapshot handles first; no map guard may live across the probes.
        let services: Vec<(String, Arc<MonitoredService>)> = self
            .services
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();

        let checks = services
            .iter()
            .map(|(name, service)| self.run_check(name, service));
        futures_util::future::join_all(checks)
            .await
            .into_iter()
            .map(|result| (result.name.clone(), result))
            .collect()
    }

    pub fn service_status(&self, name: &str) -> Option<ServiceHealthStatus> {
        self.services.get(name).map(|e| {
            let service = e.value();
            ServiceHealthStatus::from_record(name, service.options, &service.record())
        })
    }

    pub fn all_services_status(&self) -> BTreeMap<String, ServiceHealthStatus> {
        self.services
            .iter()
            .map(|e| {
                let service = e.value();
                let status = ServiceHealthStatus::from_record(e.key(), service.options, &service.record());
                (e.key().clone(), status)
            })
            .collect()
    }

    /// Alerts implied by the current records, ordered by service name.
    pub fn pending_alerts(&self) -> Vec<Alert> {
        self.all_services_status()
            .into_values()
            .filter(|s| s.status == HealthStatus::Unhealthy)
            .filter_map(|s| {
                let level = if s.is_critical {
                    AlertLevel::Critical
                } else if s.consecutive_failures >= s.max_consecutive_failures {
                    AlertLevel::Sustained
                } else {
                    return None;
                };
                Some(Alert {
                    level,
                    service: s.name,
                    consecutive_failures: s.consecutive_failures,
                    last_error: s.last_error,
                })
            })
            .collect()
    }

    /// One monitoring round: probe everything, then raise alerts.
    pub async fn tick(&self) -> BTreeMap<String, HealthCheckResult> {
        let results = self.check_all_services().await;
        for alert in self.pending_alerts() {
            self.alerts.raise(&alert);
        }
        results
    }

    /// Run the probe loop until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Health monitor disabled");
            return;
        }
        if self.config.interval_ms == 0 {
            tracing::error!("Health monitor interval must be positive, not starting");
            return;
        }

        tracing::info!(
            interval_ms = self.config.interval_ms,
            probe_timeout_ms = self.config.probe_timeout_ms,
            services = self.services.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self: &Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(shutdown))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// * Readiness Aggregator
// * Probes every enabled integration live and folds the results into one report

use crate::network::errors::ClientError;
use crate::ops::telemetry;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a reachability probe
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + 'a>>;

/// A bounded-timeout reachability check against one integration
pub trait ReadinessProbe: Send + Sync {
    fn probe(&self) -> ProbeFuture<'_>;
}

/// Status of a single integration in a readiness report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "not ready")]
    NotReady,
    #[serde(rename = "not configured")]
    NotConfigured,
}

/// Composite status: ready only if every enabled integration is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStatus {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "not ready")]
    NotReady,
}

/// Built fresh for every request; never cached
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, ServiceStatus>,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.status == OverallStatus::Ready
    }
}

struct ProbeTarget {
    name: &'static str,
    enabled: bool,
    probe: Option<Arc<dyn ReadinessProbe>>,
}

/// Aggregates reachability of the registered integrations
#[derive(Default)]
pub struct ReadinessAggregator {
    targets: Vec<ProbeTarget>,
}

impl std::fmt::Debug for ReadinessAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let targets: Vec<(&str, bool, bool)> = self
            .targets
            .iter()
            .map(|t| (t.name, t.enabled, t.probe.is_some()))
            .collect();
        f.debug_struct("ReadinessAggregator")
            .field("targets", &targets)
            .finish()
    }
}

impl ReadinessAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an integration.
    ///
    /// `probe` is `None` when the integration is enabled but its client could not be built.
    pub fn register(
        &mut self,
        name: &'static str,
        enabled: bool,
        probe: Option<Arc<dyn ReadinessProbe>>,
    ) {
        self.targets.push(ProbeTarget {
            name,
            enabled,
            probe,
        });
    }

    pub fn with_target(
        mut self,
        name: &'static str,
        enabled: bool,
        probe: Option<Arc<dyn ReadinessProbe>>,
    ) -> Self {
        self.register(name, enabled, probe);
        self
    }

    /// Probes every enabled integration concurrently. No retries.
    pub async fn check(&self) -> ReadinessReport {
        let pending = self
            .targets
            .iter()
            .filter(|target| target.enabled)
            .map(|target| async move { (target.name, Self::evaluate(target).await) });

        let services: BTreeMap<String, ServiceStatus> = join_all(pending)
            .await
            .into_iter()
            .map(|(name, status)| (name.to_string(), status))
            .collect();

        let status = if services.values().all(|s| *s == ServiceStatus::Ready) {
            OverallStatus::Ready
        } else {
            OverallStatus::NotReady
        };

        ReadinessReport {
            status,
            timestamp: Utc::now(),
            services,
        }
    }

    async fn evaluate(target: &ProbeTarget) -> ServiceStatus {
        let Some(probe) = &target.probe else {
            tracing::warn!(service = target.name, "Integration enabled but client not configured");
            telemetry::set_integration_up(target.name, false);
            return ServiceStatus::NotConfigured;
        };

        match probe.probe().await {
            Ok(()) => {
                tracing::debug!(service = target.name, "Readiness probe succeeded");
                telemetry::set_integration_up(target.name, true);
                ServiceStatus::Ready
            }
            Err(e) => {
                tracing::warn!(service = target.name, error = %e, "Readiness probe failed");
                telemetry::set_integration_up(target.name, false);
                ServiceStatus::NotReady
            }
        }
    }
}

// * Application context: everything request handlers and the scheduler share.
// * Built once at startup, then read-only behind an Arc.

use crate::config::{self, AppConfig, ConfigError};
use crate::engine::readiness::{ReadinessAggregator, ReadinessProbe};
use crate::engine::scheduler::{CallbackError, PeriodicScheduler};
use crate::network::{ClientError, DeploymentClient, IncidentClient, TrackerClient};
use crate::ops::{server, telemetry};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to resolve listen address {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No usable address for {0}")]
    NoAddress(String),

    #[error("Failed to bind HTTP server: {0}")]
    Bind(#[from] hyper::Error),
}

/// Resolves the configuration from `path` (or the search paths) and the process environment
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, StartupError> {
    Ok(config::resolve(path)?)
}

/// Client handles, one per enabled integration whose client could be built
#[derive(Default)]
pub struct Integrations {
    pub tracker: Option<Arc<TrackerClient>>,
    pub deployment: Option<Arc<DeploymentClient>>,
    pub incident: Option<Arc<IncidentClient>>,
}

impl Integrations {
    /// Builds a client for every enabled integration.
    ///
    /// A client that fails to build is logged and left out; readiness then reports it
    /// as not configured.
    pub fn connect(config: &AppConfig) -> Self {
        Self {
            tracker: build_client("tracker", config.tracker.enabled, || {
                TrackerClient::new(&config.tracker)
            }),
            deployment: build_client("deployment", config.deployment.enabled, || {
                DeploymentClient::new(&config.deployment)
            }),
            incident: build_client("incident", config.incident.enabled, || {
                IncidentClient::new(&config.incident)
            }),
        }
    }
}

fn build_client<T>(
    name: &'static str,
    enabled: bool,
    build: impl FnOnce() -> Result<T, ClientError>,
) -> Option<Arc<T>> {
    if !enabled {
        tracing::debug!(service = name, "Integration disabled");
        return None;
    }

    match build() {
        Ok(client) => {
            tracing::info!(service = name, "Integration client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::error!(service = name, error = %e, "Failed to initialize integration client");
            None
        }
    }
}

fn as_probe<T: ReadinessProbe + 'static>(client: &Option<Arc<T>>) -> Option<Arc<dyn ReadinessProbe>> {
    client
        .as_ref()
        .map(|c| Arc::clone(c) as Arc<dyn ReadinessProbe>)
}

pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub integrations: Integrations,
    pub readiness: ReadinessAggregator,
    pub scheduler: PeriodicScheduler,
}

impl AppContext {
    /// Connects the integrations described by `config` and wires the readiness checks
    pub fn build(config: AppConfig) -> Arc<Self> {
        let integrations = Integrations::connect(&config);
        Arc::new(Self::with_integrations(config, integrations))
    }

    pub fn with_integrations(config: AppConfig, integrations: Integrations) -> Self {
        let readiness = ReadinessAggregator::new()
            .with_target("tracker", config.tracker.enabled, as_probe(&integrations.tracker))
            .with_target(
                "deployment",
                config.deployment.enabled,
                as_probe(&integrations.deployment),
            )
            .with_target("incident", config.incident.enabled, as_probe(&integrations.incident));

        let config = Arc::new(config);
        let scheduler = PeriodicScheduler::from_section(&config.catapult.scheduler);
        let check_config = Arc::clone(&config);
        scheduler.configure(config.catapult.scheduler.interval(), move || {
            state_check(&check_config)
        });

        Self {
            config,
            integrations,
            readiness,
            scheduler,
        }
    }
}

// * Placeholder tick action; integrations are only read here
fn state_check(config: &AppConfig) -> Result<(), CallbackError> {
    let enabled = [
        config.tracker.enabled,
        config.deployment.enabled,
        config.incident.enabled,
    ]
    .iter()
    .filter(|e| **e)
    .count();
    tracing::debug!(enabled_integrations = enabled, "Performing state check");
    Ok(())
}

/// Runs the service until `shutdown` resolves.
///
/// The server binds before the scheduler starts; on shutdown the server drains first,
/// then the scheduler is stopped with its bounded grace period.
pub async fn run_until<F>(ctx: Arc<AppContext>, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()>,
{
    let catapult = &ctx.config.catapult;
    telemetry::set_build_info(&catapult.app_name, &catapult.app_version);

    if catapult.server.reload {
        tracing::warn!("server.reload is set but has no effect");
    }

    let addr = server::resolve_listen_addr(&catapult.server.host, catapult.server.port).await?;
    let handle = server::start_server(Arc::clone(&ctx), addr).await?;

    if catapult.scheduler.enabled {
        ctx.scheduler.start();
    } else {
        tracing::info!("Scheduler disabled by configuration");
    }

    tracing::info!(
        app = %catapult.app_name,
        version = %catapult.app_version,
        addr = %handle.local_addr(),
        "Catapult started"
    );

    shutdown.await;
    tracing::info!("Shutdown signal received");

    handle.shutdown().await;
    ctx.scheduler.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_skips_disabled() {
        let integrations = Integrations::connect(&AppConfig::default());
        assert!(integrations.tracker.is_none());
        assert!(integrations.deployment.is_none());
        assert!(integrations.incident.is_none());
    }

    #[test]
    fn test_build_client_failure_is_none() {
        let client: Option<Arc<()>> =
            build_client("tracker", true, || Err(ClientError::MissingSetting("x")));
        assert!(client.is_none());
    }

    #[tokio::test]
    async fn test_context_with_defaults_is_ready() {
        let ctx = AppContext::build(AppConfig::default());
        assert!(ctx.readiness.check().await.is_ready());
        assert_eq!(
            ctx.scheduler.status().interval,
            std::time::Duration::from_secs(15)
        );
    }

    #[tokio::test]
    async fn test_enabled_without_client_is_not_ready() {
        let mut config = AppConfig::default();
        config.incident.enabled = true;
        let ctx = AppContext::with_integrations(config, Integrations::default());

        let report = ctx.readiness.check().await;
        assert!(!report.is_ready());
        assert_eq!(
            report.services["incident"],
            crate::engine::readiness::ServiceStatus::NotConfigured
        );
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, StartupError::Config(ConfigError::NotFound(_))));
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn test_state_check_succeeds() {
        assert!(state_check(&AppConfig::default()).is_ok());
    }
}

// * Deployment controller client (Argo CD REST)
// * Bearer token preferred, basic auth as fallback; reachability via /api/version

use crate::config::DeploymentSection;
use crate::engine::readiness::{ProbeFuture, ReadinessProbe};
use crate::network::auth::Credentials;
use crate::network::client::ServiceClient;
use crate::network::errors::ClientError;
use std::time::Duration;

const VERSION_PATH: &str = "/api/version";

/// Deployment controller API client
pub struct DeploymentClient {
    http: ServiceClient,
}

impl DeploymentClient {
    pub fn new(section: &DeploymentSection) -> Result<Self, ClientError> {
        let base_url = section
            .base_url
            .as_deref()
            .ok_or(ClientError::MissingSetting("deployment.base_url"))?;

        let credentials = Credentials::from_parts(
            section.token.as_ref(),
            section.username.as_deref(),
            section.password.as_ref(),
        );
        if !section.verify_ssl {
            tracing::warn!("TLS certificate verification disabled for deployment controller");
        }

        let http = ServiceClient::new(
            "deployment",
            base_url,
            credentials,
            Duration::from_secs(section.timeout_secs),
            section.verify_ssl,
        )?;

        Ok(Self { http })
    }

    pub async fn test_connection(&self) -> Result<(), ClientError> {
        self.http.expect_ok(VERSION_PATH).await
    }

    /// Server build information as reported by the controller
    pub async fn version(&self) -> Result<serde_json::Value, ClientError> {
        self.http.get_json(VERSION_PATH, &[]).await
    }
}

impl ReadinessProbe for DeploymentClient {
    fn probe(&self) -> ProbeFuture<'_> {
        Box::pin(self.test_connection())
    }
}

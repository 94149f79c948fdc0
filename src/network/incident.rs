// * Incident manager client (FireHydrant REST)
// * Bearer token; reachability via /v1/ping, falling back to /v1/users/me

use crate::config::IncidentSection;
use crate::engine::readiness::{ProbeFuture, ReadinessProbe};
use crate::network::auth::Credentials;
use crate::network::client::ServiceClient;
use crate::network::errors::ClientError;
use reqwest::StatusCode;
use std::time::Duration;

const PING_PATH: &str = "/v1/ping";
const CURRENT_USER_PATH: &str = "/v1/users/me";

/// Incident manager API client
pub struct IncidentClient {
    http: ServiceClient,
}

impl IncidentClient {
    pub fn new(section: &IncidentSection) -> Result<Self, ClientError> {
        let base_url = section
            .base_url
            .as_deref()
            .ok_or(ClientError::MissingSetting("incident.base_url"))?;
        let api_token = section
            .api_token
            .clone()
            .ok_or(ClientError::MissingSetting("incident.api_token"))?;

        let http = ServiceClient::new(
            "incident",
            base_url,
            Credentials::Bearer(api_token),
            Duration::from_secs(section.timeout_secs),
            true,
        )?;

        Ok(Self { http })
    }

    // * Not every deployment exposes the ping endpoint; the current-user endpoint always exists
    pub async fn test_connection(&self) -> Result<(), ClientError> {
        let status = match self.http.status_of(PING_PATH).await? {
            StatusCode::NOT_FOUND => {
                tracing::debug!("Ping endpoint missing, probing current user instead");
                self.http.status_of(CURRENT_USER_PATH).await?
            }
            other => other,
        };

        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(ClientError::Status(status.as_u16()))
        }
    }
}

impl ReadinessProbe for IncidentClient {
    fn probe(&self) -> ProbeFuture<'_> {
        Box::pin(self.test_connection())
    }
}

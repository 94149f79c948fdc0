use thiserror::Error;

// * Unified Error type for the integration clients.
// * Readiness collapses every variant into "not ready"; the variant only reaches the logs.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),
}

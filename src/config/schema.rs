// * Configuration Schema
// * Typed sections for the YAML file; defaults live in constants.rs, invariants in validate()

use crate::config::constants::*;
use crate::config::errors::ConfigError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Logging verbosity accepted in `catapult.server.log_level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            // * tracing has no level above error
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = LogLevel::ALL.iter().map(|l| l.as_str()).collect();
                format!("log_level must be one of [{}], got '{}'", names.join(", "), s)
            })
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// A credential value. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

// * Empty and whitespace-only strings mean "unset"
fn non_empty<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()).map(T::from))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Accepted for compatibility with existing config files; has no runtime effect.
    pub reload: bool,
    pub log_level: LogLevel,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            reload: false,
            log_level: LogLevel::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub check_interval_secs: u64,
    pub enabled: bool,
}

impl SchedulerSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            enabled: true,
        }
    }
}

/// Core service settings under the `catapult` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatapultSection {
    pub server: ServerSection,
    pub scheduler: SchedulerSection,
    pub app_name: String,
    pub app_description: String,
    pub app_version: String,
}

impl Default for CatapultSection {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            scheduler: SchedulerSection::default(),
            app_name: DEFAULT_APP_NAME.to_string(),
            app_description: DEFAULT_APP_DESCRIPTION.to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
        }
    }
}

/// Issue tracker (Jira-style) connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSection {
    pub enabled: bool,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub api_token: Option<Secret>,
    pub timeout_secs: u64,
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            username: None,
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Deployment controller (Argo CD-style) connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentSection {
    pub enabled: bool,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub token: Option<Secret>,
    pub timeout_secs: u64,
    pub verify_ssl: bool,
}

impl Default for DeploymentSection {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            username: None,
            password: None,
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_ssl: true,
        }
    }
}

/// Incident manager (FireHydrant-style) connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentSection {
    pub enabled: bool,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub api_token: Option<Secret>,
    pub timeout_secs: u64,
}

impl Default for IncidentSection {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Complete, validated application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catapult: CatapultSection,
    pub tracker: TrackerSection,
    pub deployment: DeploymentSection,
    pub incident: IncidentSection,
}

impl AppConfig {
    /// Checks every cross-field invariant the type system cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catapult.scheduler.check_interval_secs == 0 {
            return Err(ConfigError::validation(
                "catapult.scheduler.check_interval_secs must be greater than 0",
            ));
        }

        let tracker = &self.tracker;
        check_integration(
            "tracker",
            tracker.enabled,
            tracker.timeout_secs,
            tracker.base_url.as_deref(),
            &[
                ("username", tracker.username.is_some()),
                ("api_token", tracker.api_token.is_some()),
            ],
        )?;

        let deployment = &self.deployment;
        check_integration(
            "deployment",
            deployment.enabled,
            deployment.timeout_secs,
            deployment.base_url.as_deref(),
            &[],
        )?;

        let incident = &self.incident;
        check_integration(
            "incident",
            incident.enabled,
            incident.timeout_secs,
            incident.base_url.as_deref(),
            &[("api_token", incident.api_token.is_some())],
        )?;

        Ok(())
    }
}

fn check_integration(
    section: &str,
    enabled: bool,
    timeout_secs: u64,
    base_url: Option<&str>,
    required: &[(&str, bool)],
) -> Result<(), ConfigError> {
    if timeout_secs == 0 {
        return Err(ConfigError::validation(format!(
            "{section}.timeout_secs must be greater than 0"
        )));
    }

    if let Some(raw) = base_url {
        match url::Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(ConfigError::validation(format!(
                    "{section}.base_url must use http or https, got '{}'",
                    parsed.scheme()
                )))
            }
            Err(e) => {
                return Err(ConfigError::validation(format!(
                    "{section}.base_url '{raw}' is not a valid URL: {e}"
                )))
            }
        }
    }

    if !enabled {
        return Ok(());
    }

    if base_url.is_none() {
        return Err(ConfigError::validation(format!(
            "{section}.base_url is required when {section} is enabled"
        )));
    }

    for (field, present) in required {
        if !present {
            return Err(ConfigError::validation(format!(
                "{section}.{field} is required when {section} is enabled"
            )));
        }
    }

    Ok(())
}

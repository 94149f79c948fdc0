// * Layered configuration resolution
// * defaults -> YAML file -> environment overrides -> validation

use crate::config::constants::CONFIG_SEARCH_PATHS;
use crate::config::errors::ConfigError;
use crate::config::schema::{AppConfig, DeploymentSection, IncidentSection, Secret, TrackerSection};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// * How an environment value is coerced before it lands in the tree
#[derive(Debug, Clone, Copy, PartialEq)]
enum ValueKind {
    Str,
    Int,
    Bool,
}

struct EnvOverride {
    var: &'static str,
    path: &'static [&'static str],
    kind: ValueKind,
}

const fn env(var: &'static str, path: &'static [&'static str], kind: ValueKind) -> EnvOverride {
    EnvOverride { var, path, kind }
}

// * The complete set of recognised variables; anything else in the environment is ignored
const ENV_OVERRIDES: &[EnvOverride] = &[
    env("CATAPULT_SERVER_HOST", &["catapult", "server", "host"], ValueKind::Str),
    env("CATAPULT_SERVER_PORT", &["catapult", "server", "port"], ValueKind::Int),
    env("CATAPULT_LOG_LEVEL", &["catapult", "server", "log_level"], ValueKind::Str),
    env("CATAPULT_SCHEDULER_ENABLED", &["catapult", "scheduler", "enabled"], ValueKind::Bool),
    env("CATAPULT_SCHEDULER_INTERVAL", &["catapult", "scheduler", "check_interval_secs"], ValueKind::Int),
    env("TRACKER_ENABLED", &["tracker", "enabled"], ValueKind::Bool),
    env("TRACKER_BASE_URL", &["tracker", "base_url"], ValueKind::Str),
    env("TRACKER_USERNAME", &["tracker", "username"], ValueKind::Str),
    env("TRACKER_API_TOKEN", &["tracker", "api_token"], ValueKind::Str),
    env("DEPLOYMENT_ENABLED", &["deployment", "enabled"], ValueKind::Bool),
    env("DEPLOYMENT_BASE_URL", &["deployment", "base_url"], ValueKind::Str),
    env("DEPLOYMENT_USERNAME", &["deployment", "username"], ValueKind::Str),
    env("DEPLOYMENT_PASSWORD", &["deployment", "password"], ValueKind::Str),
    env("DEPLOYMENT_TOKEN", &["deployment", "token"], ValueKind::Str),
    env("INCIDENT_ENABLED", &["incident", "enabled"], ValueKind::Bool),
    env("INCIDENT_BASE_URL", &["incident", "base_url"], ValueKind::Str),
    env("INCIDENT_API_TOKEN", &["incident", "api_token"], ValueKind::Str),
];

/// Names of every environment variable the resolver reads
pub fn recognised_env_vars() -> impl Iterator<Item = &'static str> {
    ENV_OVERRIDES.iter().map(|o| o.var)
}

#[derive(Debug, Clone)]
enum EnvSource {
    Process,
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    fn get(&self, name: &str) -> Option<String> {
        match self {
            EnvSource::Process => std::env::var(name).ok(),
            EnvSource::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

/// Resolves an [`AppConfig`] from defaults, an optional YAML file and the environment
///
/// # Example
/// ```ignore
/// use catapult::config::ConfigResolver;
///
/// let config = ConfigResolver::new().resolve(None)?;
/// println!("{}", config.catapult.server.port);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    search_paths: Vec<PathBuf>,
    env: EnvSource,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Conventional search paths, process environment
    pub fn new() -> Self {
        Self {
            search_paths: CONFIG_SEARCH_PATHS.iter().map(PathBuf::from).collect(),
            env: EnvSource::Process,
        }
    }

    /// Replaces the locations probed when no explicit path is given
    pub fn with_search_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Reads overrides from a fixed variable set instead of the process environment
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = EnvSource::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn resolve(&self, explicit_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let source = match explicit_path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Some(path) => Some(path.to_path_buf()),
            None => self.search_paths.iter().find(|p| p.is_file()).cloned(),
        };

        let mut tree = match &source {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading configuration file");
                read_yaml(path)?
            }
            None => {
                tracing::debug!("No configuration file found, using built-in defaults");
                Value::Mapping(Mapping::new())
            }
        };

        self.apply_env_overrides(&mut tree)?;

        let config: AppConfig = serde_yaml::from_value(tree)
            .map_err(|e| ConfigError::validation(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&self, tree: &mut Value) -> Result<(), ConfigError> {
        for entry in ENV_OVERRIDES {
            let Some(raw) = self.env.get(entry.var) else {
                continue;
            };

            let value = match entry.kind {
                ValueKind::Str => Value::String(raw),
                ValueKind::Bool => Value::Bool(raw.trim().eq_ignore_ascii_case("true")),
                ValueKind::Int => {
                    let parsed: i64 = raw.trim().parse().map_err(|_| {
                        ConfigError::validation(format!(
                            "{} must be an integer, got '{}'",
                            entry.var, raw
                        ))
                    })?;
                    Value::Number(parsed.into())
                }
            };

            tracing::debug!(var = entry.var, path = %entry.path.join("."), "Applying environment override");
            set_path(tree, entry.path, value)?;
        }
        Ok(())
    }
}

/// Resolves configuration with the conventional search paths and the process environment
pub fn resolve(explicit_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ConfigResolver::new().resolve(explicit_path)
}

fn read_yaml(path: &Path) -> Result<Value, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    if contents.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }

    let value: Value = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        // * An empty document is an empty mapping
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        Value::Mapping(_) => Ok(value),
        _ => Err(ConfigError::validation(format!(
            "{}: top level must be a mapping",
            path.display()
        ))),
    }
}

// * Walks (and creates) nested mappings down to the last key, then stores the value
fn set_path(tree: &mut Value, path: &[&str], value: Value) -> Result<(), ConfigError> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut node = tree;
    for (depth, key) in parents.iter().enumerate() {
        if node.is_null() {
            *node = Value::Mapping(Mapping::new());
        }
        let Value::Mapping(map) = node else {
            return Err(ConfigError::validation(format!(
                "{} must be a mapping",
                path[..depth].join(".")
            )));
        };
        node = map
            .entry(Value::String((*key).to_string()))
            .or_insert(Value::Null);
    }

    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }
    match node {
        Value::Mapping(map) => {
            map.insert(Value::String((*last).to_string()), value);
            Ok(())
        }
        _ => Err(ConfigError::validation(format!(
            "{} must be a mapping",
            parents.join(".")
        ))),
    }
}

/// Writes an example configuration file with every section present and all integrations disabled
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let example = AppConfig {
        tracker: TrackerSection {
            base_url: Some("https://yourcompany.atlassian.net".to_string()),
            username: Some("your-email@company.com".to_string()),
            api_token: Some(Secret::new("your-tracker-api-token")),
            ..TrackerSection::default()
        },
        deployment: DeploymentSection {
            base_url: Some("https://argocd.yourcompany.com".to_string()),
            username: Some("admin".to_string()),
            password: Some(Secret::new("your-deployment-password")),
            token: Some(Secret::new("your-deployment-token")),
            ..DeploymentSection::default()
        },
        incident: IncidentSection {
            base_url: Some("https://api.firehydrant.io".to_string()),
            api_token: Some(Secret::new("your-incident-api-token")),
            ..IncidentSection::default()
        },
        ..AppConfig::default()
    };

    let rendered = serde_yaml::to_string(&example)
        .map_err(|e| ConfigError::validation(format!("failed to render default config: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, rendered).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), "Default configuration written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_tree() -> Value {
        Value::Mapping(Mapping::new())
    }

    #[test]
    fn test_set_path_creates_nested_mappings() {
        let mut tree = empty_tree();
        set_path(&mut tree, &["catapult", "server", "port"], Value::Number(9000.into())).unwrap();
        assert_eq!(tree["catapult"]["server"]["port"], Value::Number(9000.into()));
    }

    #[test]
    fn test_set_path_replaces_null_section() {
        let mut tree: Value = serde_yaml::from_str("tracker:\n").unwrap();
        set_path(&mut tree, &["tracker", "enabled"], Value::Bool(true)).unwrap();
        assert_eq!(tree["tracker"]["enabled"], Value::Bool(true));
    }

    #[test]
    fn test_set_path_rejects_scalar_section() {
        let mut tree: Value = serde_yaml::from_str("catapult: 5\n").unwrap();
        let result = set_path(&mut tree, &["catapult", "server", "host"], Value::from("h"));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_bool_coercion() {
        let resolver = ConfigResolver::new()
            .with_search_paths(Vec::<PathBuf>::new())
            .with_env([("CATAPULT_SCHEDULER_ENABLED", "TRUE")]);
        let mut tree = empty_tree();
        resolver.apply_env_overrides(&mut tree).unwrap();
        assert_eq!(tree["catapult"]["scheduler"]["enabled"], Value::Bool(true));

        let resolver = resolver.with_env([("CATAPULT_SCHEDULER_ENABLED", "yes")]);
        let mut tree = empty_tree();
        resolver.apply_env_overrides(&mut tree).unwrap();
        assert_eq!(tree["catapult"]["scheduler"]["enabled"], Value::Bool(false));
    }

    #[test]
    fn test_int_coercion_failure() {
        let resolver = ConfigResolver::new().with_env([("CATAPULT_SERVER_PORT", "eighty")]);
        let mut tree = empty_tree();
        let err = resolver.apply_env_overrides(&mut tree).unwrap_err();
        assert!(err.to_string().contains("CATAPULT_SERVER_PORT"));
    }

    #[test]
    fn test_unrecognised_vars_ignored() {
        let resolver = ConfigResolver::new().with_env([("CATAPULT_SOMETHING_ELSE", "1")]);
        let mut tree = empty_tree();
        resolver.apply_env_overrides(&mut tree).unwrap();
        assert_eq!(tree, empty_tree());
    }

    #[test]
    fn test_recognised_vars_are_unique() {
        let mut vars: Vec<&str> = recognised_env_vars().collect();
        let total = vars.len();
        vars.sort_unstable();
        vars.dedup();
        assert_eq!(vars.len(), total);
    }
}

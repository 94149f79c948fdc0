// * Configuration: typed sections, layered resolution and validation

pub mod constants;
pub mod errors;
pub mod loader;
pub mod schema;

pub use errors::ConfigError;
pub use loader::{recognised_env_vars, resolve, write_default_config, ConfigResolver};
pub use schema::{
    AppConfig, CatapultSection, DeploymentSection, IncidentSection, LogLevel, SchedulerSection,
    Secret, ServerSection, TrackerSection,
};

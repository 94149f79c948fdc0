// * Configuration Constants
// * Central location for built-in defaults, search paths and timeouts

use std::time::Duration;

// * Server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

// * Scheduler tick interval in seconds
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 15;

// * Request timeout for every integration client, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// * Application metadata
pub const DEFAULT_APP_NAME: &str = "Catapult API";
pub const DEFAULT_APP_DESCRIPTION: &str = "A base HTTP API with Prometheus metrics";
pub const DEFAULT_APP_VERSION: &str = "1.0.0";

// * Probed in order when no explicit config path is given
pub const CONFIG_SEARCH_PATHS: [&str; 3] = [
    "config.yaml",
    "config/config.yaml",
    "/etc/catapult/config.yaml",
];

// * How long stop() waits for the scheduler worker before giving up
pub const SCHEDULER_STOP_GRACE: Duration = Duration::from_secs(5);

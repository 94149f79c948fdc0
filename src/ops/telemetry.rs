// * Telemetry - JSON Logging and Prometheus Metrics
// * Provides structured logging and metrics for production observability

use crate::config::LogLevel;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

lazy_static! {
    // * Request counter by method, route and status code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "endpoint", "status"]
    ).expect("http_requests_total registers once");

    // * Request latency histogram
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds",
        &["method", "endpoint"]
    ).expect("http_request_duration_seconds registers once");

    // * In-flight requests
    pub static ref HTTP_REQUESTS_IN_PROGRESS: GaugeVec = register_gauge_vec!(
        "http_requests_in_progress",
        "Number of HTTP requests currently in progress",
        &["method", "endpoint"]
    ).expect("http_requests_in_progress registers once");

    // * Scheduler ticks by outcome (ok, error, panic)
    pub static ref SCHEDULER_TICKS_TOTAL: CounterVec = register_counter_vec!(
        "catapult_scheduler_ticks_total",
        "Total number of scheduler ticks by outcome",
        &["outcome"]
    ).expect("catapult_scheduler_ticks_total registers once");

    // * Last readiness probe result per integration (1 = reachable)
    pub static ref INTEGRATION_UP: GaugeVec = register_gauge_vec!(
        "catapult_integration_up",
        "Whether the last readiness probe of an integration succeeded",
        &["service"]
    ).expect("catapult_integration_up registers once");

    // * Constant 1, labelled with application metadata
    pub static ref BUILD_INFO: GaugeVec = register_gauge_vec!(
        "catapult_build_info",
        "Application name and version",
        &["name", "version"]
    ).expect("catapult_build_info registers once");
}

/// Initializes the tracing subscriber with JSON formatting at the configured level
///
/// `RUST_LOG`, when set, takes precedence over `level`.
///
/// # Example
/// ```ignore
/// use catapult::ops::telemetry;
///
/// telemetry::init_tracing(LogLevel::Info);
/// tracing::info!(service = "tracker", "Probing integration");
/// ```
pub fn init_tracing(level: LogLevel) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    // * try_init: a second initialisation (e.g. in tests) is not fatal
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .try_init();
}

/// Initializes tracing with pretty formatting (for development)
pub fn init_tracing_pretty(level: LogLevel) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().pretty())
        .try_init();
}

/// Returns the current metrics in the Prometheus text exposition format
pub fn get_metrics_string() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Content type of [`get_metrics_string`]
pub fn metrics_content_type() -> &'static str {
    prometheus::TEXT_FORMAT
}

/// Marks a request as in flight; pair with [`request_finished`]
pub fn request_started(method: &str, endpoint: &str) {
    HTTP_REQUESTS_IN_PROGRESS
        .with_label_values(&[method, endpoint])
        .inc();
}

/// Records a completed request
pub fn request_finished(method: &str, endpoint: &str, status: u16, seconds: f64) {
    HTTP_REQUESTS_IN_PROGRESS
        .with_label_values(&[method, endpoint])
        .dec();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(seconds);
}

/// Records one scheduler tick
pub fn record_scheduler_tick(outcome: &str) {
    SCHEDULER_TICKS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Updates the reachability gauge of an integration
pub fn set_integration_up(service: &str, up: bool) {
    INTEGRATION_UP
        .with_label_values(&[service])
        .set(if up { 1.0 } else { 0.0 });
}

/// Publishes application metadata
pub fn set_build_info(name: &str, version: &str) {
    BUILD_INFO.with_label_values(&[name, version]).set(1.0);
}

// * Operations: HTTP surface, structured logging and Prometheus metrics

pub mod server;
pub mod telemetry;

pub use server::{handle_request, resolve_listen_addr, start_server, ServerHandle};
pub use telemetry::{
    get_metrics_string, init_tracing, init_tracing_pretty, metrics_content_type,
    record_scheduler_tick, request_finished, request_started, set_build_info, set_integration_up,
};

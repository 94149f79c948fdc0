use catapult::app::{self, AppContext};
use catapult::config;
use catapult::ops::telemetry;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "catapult", version, about = "Health, readiness and metrics service")]
struct Cli {
    /// Configuration file; overrides the search path
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write an example configuration file and exit
    #[arg(long, value_name = "PATH", conflicts_with = "config")]
    write_default_config: Option<PathBuf>,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(path) = cli.write_default_config {
        return match config::write_default_config(&path) {
            Ok(()) => {
                println!("Default configuration written to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("catapult: {e}");
                ExitCode::FAILURE
            }
        };
    }

    // * Logging is not up yet; configuration errors go straight to stderr
    let config = match app::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("catapult: {e}");
            return ExitCode::FAILURE;
        }
    };

    let level = config.catapult.server.log_level;
    if cli.pretty_logs {
        telemetry::init_tracing_pretty(level);
    } else {
        telemetry::init_tracing(level);
    }

    let ctx = AppContext::build(config);
    match app::run_until(ctx, shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Catapult failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! Supervised demo server.
//!
//! Serves a small set of built-in services on a plaintext port until
//! SIGINT, SIGQUIT or SIGTERM, then drains within the configured grace period.
//!
//! ```text
//! server-supervisor --config server.toml --port 9003 --grace-period-secs 10
//! ```

use std::path::PathBuf;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Json;
use clap::Parser;
use serde_json::{json, Value};

use server_supervisor::config::{load_config, SupervisorConfig};
use server_supervisor::observability::init_logging;
use server_supervisor::{ServerSupervisor, ServiceRegistry};

#[derive(Parser)]
#[command(name = "server-supervisor")]
#[command(about = "Serve built-in services until interrupted, then shut down gracefully", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen port (0 for an ephemeral port).
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the shutdown grace period.
    #[arg(short, long)]
    grace_period_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SupervisorConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(secs) = cli.grace_period_secs {
        config.shutdown.grace_period_secs = secs;
    }

    init_logging(&config.observability)?;

    tracing::info!(
        port = config.listener.port,
        max_connections = config.listener.max_connections,
        grace_period_secs = config.shutdown.grace_period_secs,
        "server-supervisor v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let outcome = ServerSupervisor::from_config(&config, builtin_services())
        .run_until_interrupted()
        .await?;

    tracing::info!(outcome = outcome.as_str(), "Shutdown complete");
    Ok(())
}

fn builtin_services() -> ServiceRegistry {
    let started = Instant::now();

    ServiceRegistry::new()
        .register(|server| {
            server.route("/healthz", get(|| async { "ok" }));
        })
        .register(|server| {
            server.route("/echo", post(|body: String| async move { body }));
        })
        .register(move |server| {
            server.route(
                "/status",
                get(move || async move { Json(status(started)) }),
            );
        })
}

fn status(started: Instant) -> Value {
    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": started.elapsed().as_secs(),
    })
}

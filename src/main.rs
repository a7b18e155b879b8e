//! fx-gateway
//!
//! Currency conversion API that mirrors its traffic to an analytics binding.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ timeout ─▶ metrics ─▶ mirror ─▶ routes ─▶ rates
//!                                                                    │
//!     Client Response                                                │ envelope
//!     ◀──────────────────────────────────────────────────────────────┤
//!                                                                    ▼
//!                                                         background delivery
//!                                                     (structured call / fetch)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use fx_gateway::config::{load_or_default, EnvVars};
use fx_gateway::lifecycle::{shutdown_signal, Shutdown};
use fx_gateway::observability::{init_logging, init_metrics};
use fx_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "fx-gateway", version, about = "Currency conversion API with request mirroring")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "FX_GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref())?;
    init_logging(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fx-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        mirror_binding = ?config.mirror.binding,
        rates_path = ?config.rates.path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, EnvVars::from_process())?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

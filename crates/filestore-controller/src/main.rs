//! Controller binary.
//!
//! Starts the coordinator of the replicated file store.
//!
//! ```bash
//! controller <cport> <R> <timeout_ms> <rebalance_period_ms>
//! ```
//!
//! - `cport`: port to listen on for store and client connections
//! - `R`: replication factor; every file lands on exactly R stores
//! - `timeout_ms`: deadline for in-flight store/remove operations
//! - `rebalance_period_ms`: accepted for interface compatibility; the
//!   core never rebalances
//!
//! Logging is controlled through `RUST_LOG` (default: `info`).

use clap::Parser;
use filestore_controller::{Controller, ControllerConfig};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "controller")]
#[command(about = "Coordinator for the replicated file store", long_about = None)]
struct Args {
    /// Port to listen on
    cport: u16,

    /// Replication factor (R)
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    replication_factor: u32,

    /// Operation timeout in milliseconds
    timeout_ms: u64,

    /// Rebalance period in milliseconds (accepted, unused)
    rebalance_period_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ControllerConfig {
        replication_factor: args.replication_factor as usize,
        timeout: Duration::from_millis(args.timeout_ms),
        rebalance_period: Duration::from_millis(args.rebalance_period_ms),
    };

    let handle = Controller::start(config, ("0.0.0.0", args.cport)).await?;

    shutdown_signal().await;
    info!("shutdown signal received; stopping controller");
    handle.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

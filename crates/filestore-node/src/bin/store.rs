//! Store node binary.
//!
//! ```bash
//! store <port> <cport> <timeout_ms> <file_folder>
//! ```
//!
//! - `port`: client-facing port to listen on (also the membership key)
//! - `cport`: controller port on the local host
//! - `timeout_ms`: control-channel polling interval
//! - `file_folder`: directory for stored files; wiped at startup
//!
//! Logging is controlled through `RUST_LOG` (default: `info`).

use clap::Parser;
use filestore_node::{StoreConfig, StoreNode};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "store")]
#[command(about = "Store node for the replicated file store", long_about = None)]
struct Args {
    /// Client-facing port
    port: u16,

    /// Controller port
    cport: u16,

    /// Control-channel polling interval in milliseconds
    timeout_ms: u64,

    /// Directory for stored files (wiped at startup)
    file_folder: PathBuf,
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
    let node = StoreNode::start(StoreConfig {
        port: args.port,
        controller_addr: format!("127.0.0.1:{}", args.cport),
        timeout: Duration::from_millis(args.timeout_ms),
        folder: args.file_folder,
    })
    .await?;

    shutdown_signal().await;
    info!("shutdown signal received; stopping store node");
    node.shutdown();
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

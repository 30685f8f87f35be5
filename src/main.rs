//! sockhub server
//!
//! Accepts raw TCP connections on the configured address, tracks them in the
//! registry, and logs lifecycle events. Upgraded message connections are
//! attached by embedding the library; this binary serves the raw listener.
//!
//! ```text
//!     Client ──connect──▶ net::listener ──register──▶ registry
//!                              │                         │
//!                              ▼                         ▼
//!                        connection task ──events──▶ subscribers
//! ```

use std::path::PathBuf;

use clap::Parser;

use sockhub::config::{load_config, HubConfig};
use sockhub::SocketHub;

#[derive(Parser)]
#[command(name = "sockhub", about = "Connection hub server")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    sockhub::observability::logging::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => HubConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backlog = config.listener.backlog,
        recv_buffer_bytes = config.connection.recv_buffer_bytes,
        "Configuration loaded"
    );

    let hub = SocketHub::new(config);

    hub.events().subscribe_connect(|info| {
        tracing::info!(connection_id = %info.id, peer_addr = %info.peer_addr, "Peer connected");
    });
    hub.events().subscribe_close(|info| {
        tracing::info!(connection_id = %info.id, "Peer disconnected");
    });
    hub.events().subscribe_error(|info, err| {
        tracing::warn!(connection_id = %info.id, error = %err, "Connection error");
    });

    let addr = hub.start().await?;
    tracing::info!(address = %addr, "Listening for connections");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    hub.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

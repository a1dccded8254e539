//! Audio Socket Bridge
//!
//! Receives sound events from the browser userscript (HTTP POST) and
//! re-broadcasts them over TCP in the same JSON line format as the game
//! plugin, so one consumer works with both producers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use audiosocket_bridge::ingest;
use audiosocket_bridge::{BridgeConfig, BridgeState, KindFilter};
use audiosocket_broadcaster::SoundBroadcaster;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "audiosocket-bridge",
    version,
    about = "Relay browser sound events to TCP consumers"
)]
struct Args {
    /// Configuration file (default: <config dir>/audiosocket/bridge.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP address the userscript posts to
    #[arg(long)]
    ingest_addr: Option<String>,

    /// TCP address consumers connect to
    #[arg(long)]
    broadcast_addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    info!("Starting Audio Socket Bridge v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => BridgeConfig::load_from(path),
        None => BridgeConfig::load(),
    }
    .context("Failed to load configuration")?;

    info!("Configuration loaded from {}", config.config_path.display());

    if let Some(addr) = args.ingest_addr {
        config.ingest_addr = addr;
    }
    if let Some(addr) = args.broadcast_addr {
        config.broadcast_addr = addr;
    }

    let broadcaster = SoundBroadcaster::new(config.broadcast_addr.clone());
    let broadcast_addr = broadcaster
        .start()
        .await
        .context("Failed to start TCP broadcaster")?;

    let state = Arc::new(BridgeState::new(
        broadcaster.registry().clone(),
        KindFilter::from_config(&config),
    ));

    let listener = tokio::net::TcpListener::bind(&config.ingest_addr)
        .await
        .with_context(|| format!("Failed to bind ingestion endpoint on {}", config.ingest_addr))?;

    info!("Bridge running");
    info!("  - Producers POST to http://{}/sound", listener.local_addr()?);
    info!("  - Consumers connect to {}", broadcast_addr);

    tokio::select! {
        result = ingest::serve(listener, state.clone()) => {
            if let Err(e) = result {
                error!("Ingestion endpoint error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    broadcaster.stop().await?;
    info!("Bridge stopped after {} event(s)", state.event_count());

    Ok(())
}

//! Audio Socket Client
//!
//! Connects to the game plugin or the bridge and prints sound events as
//! they arrive. `--discover` tracks every distinct sound id and prints a
//! summary on exit.

mod handlers;

use anyhow::{Context, Result};
use audiosocket_broadcaster::{ReadOutcome, StreamReader};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::handlers::{ConsumerHandler, DiscoveryHandler, PrintHandler};

#[derive(Parser, Debug)]
#[command(name = "audiosocket-client", version, about = "Print sound events from an audio socket")]
struct Args {
    /// Host to connect to
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to connect to
    #[arg(long, default_value_t = 5150)]
    port: u16,

    /// Track all unique sound ids and print a summary on exit
    #[arg(long)]
    discover: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Events go to stdout, diagnostics to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut handler: Box<dyn ConsumerHandler> = if args.discover {
        info!("Discovery mode: all unique sound ids will be tracked, Ctrl+C for the summary");
        Box::new(DiscoveryHandler::default())
    } else {
        Box::new(PrintHandler)
    };

    let mut reader = StreamReader::connect(&args.host, args.port)
        .await
        .with_context(|| {
            format!(
                "Make sure the game plugin or the bridge is running on port {}",
                args.port
            )
        })?;

    info!("Listening for sound events...");

    tokio::select! {
        outcome = reader.run(&mut *handler) => {
            match outcome.context("Failed to read from socket")? {
                ReadOutcome::Disconnected => info!("Disconnected"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    if let Some(summary) = handler.summary() {
        println!("\n{}", summary);
    }

    Ok(())
}

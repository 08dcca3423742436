//! Sequencer router
//!
//! Reverse proxy in front of one leader and zero or more follower nodes.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                  SEQUENCER ROUTER                    │
//!                      │                                                      │
//!   Client Request     │  ┌─────────┐   ┌────────────┐   ┌──────────┐         │
//!   ───────────────────┼─▶│  http   │──▶│ classifier │──▶│ selector │         │
//!                      │  │ server  │   │ (+ body    │   │          │         │
//!                      │  └─────────┘   │   sniff)   │   └────┬─────┘         │
//!                      │                └────────────┘        │ Arc<Registry>  │
//!                      │                                      ▼                │
//!   Client Response    │  ┌─────────┐                  ┌──────────────┐        │
//!   ◀──────────────────┼──│ forward │◀─────────────────│   registry   │        │      Leader /
//!                      │  │ / ws    │──────────────────┼──────────────┼────────┼────▶ Followers
//!                      │  └─────────┘                  └──────▲───────┘        │
//!                      │                                      │ swap           │
//!                      │          ┌───────────┐   ┌───────────┴──┐             │
//!                      │          │ bootstrap │   │  discovery   │◀────────────┼──── Membership DB
//!                      │          │ (once)    │   │  / watcher   │             │
//!                      │          └───────────┘   └──────────────┘             │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use sequencer_router::config::load_config;
use sequencer_router::lifecycle;
use sequencer_router::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "sequencer-router")]
#[command(about = "Leader/follower aware reverse proxy for a sequencer cluster", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.observability);

    tracing::info!(
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        stack = %config.bootstrap.stack,
        embedded_discovery = config.discovery.embedded,
        "Configuration loaded"
    );

    if let Err(e) = lifecycle::run(config).await {
        tracing::error!(error = %e, "Router exited with error");
        return Err(e.into());
    }
    Ok(())
}

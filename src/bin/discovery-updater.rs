//! Standalone discovery updater.
//!
//! Polls the membership database and rewrites the registry snapshot file that
//! the router watches.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use sequencer_router::config::load_config;
use sequencer_router::discovery::{DiscoveryUpdater, PgMembershipStore, RefreshOutcome, SnapshotFileSink};
use sequencer_router::lifecycle::{signals, Shutdown};
use sequencer_router::observability::logging::init_logging;
use sequencer_router::registry::last_generation;

#[derive(Parser)]
#[command(name = "discovery-updater")]
#[command(about = "Publishes sequencer membership as a registry snapshot file", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,

    /// Override `discovery.snapshot_path`.
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Run a single refresh cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.observability);

    let snapshot_path = cli
        .snapshot
        .unwrap_or_else(|| PathBuf::from(&config.discovery.snapshot_path));

    // Continue numbering from whatever is already on disk.
    let generation = last_generation(&snapshot_path);

    let store = PgMembershipStore::connect_lazy(&config.discovery)?;
    let mut updater = DiscoveryUpdater::from_config(Arc::new(store), &config.discovery)
        .with_sink(Arc::new(SnapshotFileSink::new(&snapshot_path)))
        .starting_after(generation);

    if cli.once {
        match updater.refresh_once().await? {
            RefreshOutcome::Published { generation } => {
                tracing::info!(generation, path = ?snapshot_path, "Snapshot written");
            }
            RefreshOutcome::Unchanged => tracing::info!("Membership unchanged"),
        }
        return Ok(());
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    updater.run(shutdown.subscribe()).await;
    Ok(())
}

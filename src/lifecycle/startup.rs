//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Resolve the initial leader before anything listens
//! - Start background tasks (snapshot watcher, embedded discovery, admin)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::{serve_admin, AdminState};
use crate::bootstrap::{
    resolve_initial_leader, seed_registry, BootstrapError, FleetError, HttpFleetApi, RetryBudget, TagFilter,
};
use crate::config::ProxyConfig;
use crate::discovery::{DiscoveryError, DiscoveryUpdater, PgMembershipStore};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::net::load_tls_config;
use crate::observability::metrics;
use crate::registry::{RegistryHandle, SnapshotWatcher};
use crate::routing::Classifier;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid {field} '{value}'")]
    Address { field: &'static str, value: String },

    #[error("leader bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("fleet client setup failed: {0}")]
    Fleet(#[from] FleetError),

    #[error("discovery setup failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("snapshot watcher failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the router until SIGINT/SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    run_with_shutdown(config, shutdown).await
}

/// Run the router until `shutdown` is triggered.
pub async fn run_with_shutdown(config: ProxyConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sequencer-router starting");

    if config.observability.metrics_enabled {
        let addr = parse_addr("observability.metrics_address", &config.observability.metrics_address)?;
        metrics::init_metrics(addr);
    }

    // 1. Initial leader (fatal on exhaustion)
    let registry = RegistryHandle::new();
    let fleet = HttpFleetApi::new(&config.bootstrap)?;
    let leader = resolve_initial_leader(
        &fleet,
        &TagFilter::from_config(&config.bootstrap),
        config.bootstrap.leader_port,
        &RetryBudget::from_config(&config.bootstrap),
        &mut shutdown.subscribe(),
    )
    .await?;
    seed_registry(&registry, &leader);

    // 2. Generated snapshot, if an external updater maintains one
    let _snapshot_watcher = match &config.registry.snapshot_path {
        Some(path) => {
            let watcher = SnapshotWatcher::new(Path::new(path), registry.clone());
            watcher.load_initial();
            Some(watcher.run()?)
        }
        None => None,
    };

    // 3. Embedded discovery
    if config.discovery.embedded {
        let store = PgMembershipStore::connect_lazy(&config.discovery)?;
        let updater = DiscoveryUpdater::from_config(Arc::new(store), &config.discovery)
            .with_sink(Arc::new(registry.clone()))
            .starting_after(registry.generation());
        tokio::spawn(updater.run(shutdown.subscribe()));
    }

    // 4. Admin API
    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            registry: registry.clone(),
            classifier: Arc::new(Classifier::from_config(
                &config.classifier,
                Duration::from_millis(config.timeouts.body_read_ms),
            )),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        let signal = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = serve_admin(listener, state, signal).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    // 5. Traffic
    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, registry);
    let result = match tls {
        Some(tls) => {
            let addr = parse_addr("listener.bind_address", &bind_address)?;
            let rustls = load_tls_config(&tls).await?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, shutdown.subscribe()).await
        }
    };

    // Stop background loops even if the server exited on its own.
    shutdown.trigger();
    tracing::info!("Shutdown complete");
    Ok(result?)
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, StartupError> {
    value.parse().map_err(|_| StartupError::Address {
        field,
        value: value.to_string(),
    })
}

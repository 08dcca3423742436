//! Polling loop that keeps the registry in step with the membership store.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};

use crate::config::DiscoveryConfig;
use crate::discovery::sink::RegistrySink;
use crate::discovery::store::{entries_from_rows, MembershipStore};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::registry::{Registry, RegistryError, SnapshotError};

/// Reasons a refresh cycle did not publish.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("membership query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("membership query timed out after {0:?}")]
    Timeout(Duration),

    #[error("membership store returned no routable nodes")]
    EmptyMembership,

    #[error("invalid membership row: {0}")]
    InvalidRow(String),

    #[error("inconsistent membership: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to publish snapshot: {0}")]
    Publish(#[from] SnapshotError),
}

/// Result of a successful refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published { generation: u64 },
    Unchanged,
}

/// Periodically rebuilds the registry from the membership store.
pub struct DiscoveryUpdater {
    store: Arc<dyn MembershipStore>,
    sinks: Vec<Arc<dyn RegistrySink>>,
    stack: String,
    poll_interval: Duration,
    query_timeout: Duration,
    generation: u64,
    last_published: Option<Registry>,
}

impl DiscoveryUpdater {
    pub fn new(
        store: Arc<dyn MembershipStore>,
        stack: impl Into<String>,
        poll_interval: Duration,
        query_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sinks: Vec::new(),
            stack: stack.into(),
            poll_interval,
            query_timeout,
            generation: 0,
            last_published: None,
        }
    }

    pub fn from_config(store: Arc<dyn MembershipStore>, config: &DiscoveryConfig) -> Self {
        Self::new(
            store,
            config.stack.clone(),
            Duration::from_secs(config.poll_interval_secs),
            Duration::from_secs(config.query_timeout_secs),
        )
    }

    /// Add a destination for published snapshots.
    pub fn with_sink(mut self, sink: Arc<dyn RegistrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number published snapshots after `generation`.
    pub fn starting_after(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// Generation of the last published snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run one query/build/publish cycle.
    ///
    /// On error nothing is published and the previous snapshot stays live.
    pub async fn refresh_once(&mut self) -> Result<RefreshOutcome, DiscoveryError> {
        let rows = time::timeout(self.query_timeout, self.store.fetch_members(&self.stack))
            .await
            .map_err(|_| DiscoveryError::Timeout(self.query_timeout))??;

        let entries = entries_from_rows(rows)?;
        if entries.is_empty() {
            return Err(DiscoveryError::EmptyMembership);
        }

        let candidate = Registry::from_entries(entries, self.generation + 1)?;
        if let Some(last) = &self.last_published {
            if last.same_backends(&candidate) {
                return Ok(RefreshOutcome::Unchanged);
            }
        }

        for sink in &self.sinks {
            sink.publish(&candidate).await?;
            tracing::debug!(sink = sink.name(), generation = candidate.generation(), "Snapshot published");
        }

        self.generation = candidate.generation();
        self.last_published = Some(candidate);
        Ok(RefreshOutcome::Published {
            generation: self.generation,
        })
    }

    /// Poll until shutdown. Failures are logged and never stop the loop.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            stack = %self.stack,
            interval = ?self.poll_interval,
            sinks = self.sinks.len(),
            "Discovery updater starting"
        );

        let mut ticker = time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.refresh_once().await {
                        Ok(RefreshOutcome::Published { generation }) => {
                            metrics::record_registry_refresh("published");
                            tracing::info!(generation, "Registry refreshed");
                        }
                        Ok(RefreshOutcome::Unchanged) => {
                            metrics::record_registry_refresh("unchanged");
                            tracing::debug!("Membership unchanged");
                        }
                        Err(e) => {
                            metrics::record_registry_refresh("failed");
                            tracing::warn!(error = %e, "Registry refresh failed. Keeping last-known-good snapshot.");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Discovery updater received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

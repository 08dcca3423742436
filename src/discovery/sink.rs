//! Destinations for freshly built registry snapshots.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::discovery::updater::DiscoveryError;
use crate::registry::{write_snapshot, Registry, RegistryHandle, SnapshotError};

/// Receives each complete snapshot the updater builds.
#[async_trait]
pub trait RegistrySink: Send + Sync {
    async fn publish(&self, registry: &Registry) -> Result<(), DiscoveryError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Embedded mode: swap the proxy's live registry directly.
#[async_trait]
impl RegistrySink for RegistryHandle {
    async fn publish(&self, registry: &Registry) -> Result<(), DiscoveryError> {
        self.install(registry.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "registry"
    }
}

/// Standalone mode: write the snapshot file the proxy watches.
#[derive(Debug, Clone)]
pub struct SnapshotFileSink {
    path: PathBuf,
}

impl SnapshotFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RegistrySink for SnapshotFileSink {
    async fn publish(&self, registry: &Registry) -> Result<(), DiscoveryError> {
        let path = self.path.clone();
        let registry = registry.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &registry))
            .await
            .map_err(|e| SnapshotError::Io(std::io::Error::other(e)))??;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "snapshot_file"
    }
}

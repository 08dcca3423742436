//! Shared, atomically swapped registry reference.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::observability::metrics;
use crate::registry::snapshot::Registry;

/// Cloneable handle to the current registry snapshot.
///
/// Readers call [`RegistryHandle::load`] and get either the fully-old or the
/// fully-new snapshot. Writers only ever replace the whole pointer.
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    current: Arc<ArcSwap<Registry>>,
}

impl RegistryHandle {
    /// Handle holding an empty registry.
    pub fn new() -> Self {
        Self::with_registry(Registry::empty())
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Replace the snapshot, returning the previous one.
    pub fn install(&self, registry: Registry) -> Arc<Registry> {
        tracing::info!(
            generation = registry.generation(),
            backends = registry.len(),
            leader = registry.leader().unwrap_or("<none>"),
            "Registry snapshot installed"
        );
        metrics::record_registry_installed(registry.generation(), registry.len());
        self.current.swap(Arc::new(registry))
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::new()
    }
}

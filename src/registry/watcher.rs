//! Snapshot file watcher for registry hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::observability::metrics;
use crate::registry::file::read_snapshot;
use crate::registry::handle::RegistryHandle;

/// Watches the generated snapshot file and installs every valid version.
///
/// A snapshot without a leader is never installed: the file only ever
/// replaces a registry that already routes writes.
///
/// The parent directory is watched rather than the file itself: the updater
/// replaces the file by rename, which would orphan a watch on the old inode.
pub struct SnapshotWatcher {
    path: PathBuf,
    registry: RegistryHandle,
}

impl SnapshotWatcher {
    pub fn new(path: &Path, registry: RegistryHandle) -> Self {
        Self {
            path: path.to_path_buf(),
            registry,
        }
    }

    /// Install the file's current contents, if it exists.
    ///
    /// Returns true if a snapshot was installed.
    pub fn load_initial(&self) -> bool {
        if !self.path.exists() {
            tracing::info!(path = ?self.path, "No registry snapshot file yet");
            return false;
        }
        reload(&self.path, &self.registry)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let registry = self.registry.clone();
        let file_name = path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let touches_snapshot = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_snapshot {
                        tracing::debug!("Registry snapshot change detected, reloading");
                        reload(&path, &registry);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Registry snapshot watcher started");
        Ok(watcher)
    }
}

fn reload(path: &Path, registry: &RegistryHandle) -> bool {
    match read_snapshot(path) {
        Ok(snapshot) if snapshot.leader().is_none() => {
            tracing::warn!(
                path = ?path,
                generation = snapshot.generation(),
                entries = snapshot.len(),
                "Registry snapshot has no leader. Keeping current registry."
            );
            metrics::record_registry_refresh("reload_failed");
            false
        }
        Ok(snapshot) => {
            if registry.load().same_backends(&snapshot) {
                tracing::debug!(generation = snapshot.generation(), "Snapshot unchanged");
                return false;
            }
            registry.install(snapshot);
            metrics::record_registry_refresh("reloaded");
            true
        }
        Err(e) => {
            tracing::warn!(
                path = ?path,
                error = %e,
                "Failed to reload registry snapshot. Keeping current registry."
            );
            metrics::record_registry_refresh("reload_failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::file::write_snapshot;
    use crate::registry::snapshot::{Registry, RegistryEntry};
    use std::fs;

    #[test]
    fn initial_load_installs_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        let registry = RegistryHandle::new();
        let watcher = SnapshotWatcher::new(&path, registry.clone());

        assert!(!watcher.load_initial());

        let snapshot = Registry::from_entries(vec![RegistryEntry::leader("10.0.1.10:12346")], 3).unwrap();
        write_snapshot(&path, &snapshot).unwrap();
        assert!(watcher.load_initial());
        assert_eq!(registry.load().leader(), Some("10.0.1.10:12346"));
    }

    #[test]
    fn broken_file_keeps_last_known_good() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        let good = Registry::from_entries(vec![RegistryEntry::leader("10.0.1.10:12346")], 1).unwrap();
        let registry = RegistryHandle::with_registry(good.clone());

        fs::write(&path, "generation = \"oops\"").unwrap();
        assert!(!reload(&path, &registry));
        assert_eq!(*registry.load(), good);
    }

    #[test]
    fn empty_file_keeps_last_known_good() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        let good = Registry::from_entries(vec![RegistryEntry::leader("10.0.1.10:12346")], 1).unwrap();
        let registry = RegistryHandle::with_registry(good.clone());

        fs::write(&path, "").unwrap();
        assert!(!reload(&path, &registry));
        assert_eq!(registry.load().leader(), Some("10.0.1.10:12346"));
        assert_eq!(*registry.load(), good);
    }

    #[test]
    fn leaderless_file_does_not_replace_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        let seed = Registry::from_entries(vec![RegistryEntry::leader("10.0.1.10:12346")], 1).unwrap();
        let registry = RegistryHandle::with_registry(seed.clone());

        let leaderless = Registry::from_entries(vec![RegistryEntry::follower(1, "10.0.1.11:12346")], 4).unwrap();
        write_snapshot(&path, &leaderless).unwrap();

        let watcher = SnapshotWatcher::new(&path, registry.clone());
        assert!(!watcher.load_initial());
        assert!(!reload(&path, &registry));
        assert_eq!(*registry.load(), seed);
    }

    #[tokio::test]
    async fn picks_up_rewritten_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        let registry = RegistryHandle::new();
        let _watcher = SnapshotWatcher::new(&path, registry.clone()).run().unwrap();

        let snapshot = Registry::from_entries(
            vec![
                RegistryEntry::leader("10.0.1.10:12346"),
                RegistryEntry::follower(1, "10.0.1.11:12346"),
            ],
            5,
        )
        .unwrap();
        write_snapshot(&path, &snapshot).unwrap();

        for _ in 0..50 {
            if registry.generation() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(registry.load().follower(1), Some("10.0.1.11:12346"));
    }
}

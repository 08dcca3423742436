//! Registry snapshot file.
//!
//! The discovery updater publishes snapshots as a small TOML document that
//! the proxy reloads:
//!
//! ```toml
//! generation = 42
//!
//! [backends]
//! leader = "10.0.1.10:12346"
//! follower_1 = "10.0.1.11:12346"
//! ```
//!
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so a reader never observes a partially written document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::registry::snapshot::{Registry, RegistryError};

/// Errors reading or writing a snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(#[from] RegistryError),
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    generation: u64,
    #[serde(default)]
    backends: BTreeMap<String, String>,
}

/// Read and validate a snapshot file.
pub fn read_snapshot(path: &Path) -> Result<Registry, SnapshotError> {
    let content = fs::read_to_string(path)?;
    parse_snapshot(&content)
}

/// Parse a snapshot document.
pub fn parse_snapshot(content: &str) -> Result<Registry, SnapshotError> {
    let document: SnapshotDocument = toml::from_str(content)?;
    Ok(Registry::from_map(document.backends, document.generation)?)
}

/// Generation of the snapshot already at `path`, or 0 if there is none.
///
/// An unreadable file is logged and treated as absent.
pub fn last_generation(path: &Path) -> u64 {
    match read_snapshot(path) {
        Ok(existing) => existing.generation(),
        Err(SnapshotError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => {
            tracing::warn!(
                path = ?path,
                error = %e,
                "Existing registry snapshot is unreadable. Restarting generations at 1."
            );
            0
        }
    }
}

/// Atomically replace the snapshot file at `path`.
pub fn write_snapshot(path: &Path, registry: &Registry) -> Result<(), SnapshotError> {
    let document = SnapshotDocument {
        generation: registry.generation(),
        backends: registry.backends().clone(),
    };
    let content = toml::to_string(&document)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SnapshotError::Io(e.error))?;

    tracing::debug!(path = ?path, generation = registry.generation(), "Snapshot file written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::snapshot::RegistryEntry;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        let registry = Registry::from_entries(
            vec![
                RegistryEntry::leader("10.0.1.10:12346"),
                RegistryEntry::follower(1, "10.0.1.11:12346"),
            ],
            9,
        )
        .unwrap();

        write_snapshot(&path, &registry).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), registry);

        // Overwrite in place.
        let next = Registry::from_entries(vec![RegistryEntry::leader("10.0.1.11:12346")], 10).unwrap();
        write_snapshot(&path, &next).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), next);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = parse_snapshot(
            r#"
            generation = 1
            [backends]
            primary = "10.0.1.10:12346"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SnapshotError::Invalid(RegistryError::InvalidKey(_))));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let registry = parse_snapshot("").unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn last_generation_of_missing_or_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        assert_eq!(last_generation(&path), 0);

        let registry = Registry::from_entries(vec![RegistryEntry::leader("10.0.1.10:12346")], 12).unwrap();
        write_snapshot(&path, &registry).unwrap();
        assert_eq!(last_generation(&path), 12);

        fs::write(&path, "generation = \"twelve\"").unwrap();
        assert_eq!(last_generation(&path), 0);
    }

    #[test]
    fn malformed_document_is_parse_error() {
        assert!(matches!(
            parse_snapshot("backends = ["),
            Err(SnapshotError::Parse(_))
        ));
    }
}

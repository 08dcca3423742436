//! Immutable registry snapshots.
//!
//! # Responsibilities
//! - Map role keys (`leader`, `follower_1`, ...) to `host:port` addresses
//! - Enforce the single-leader invariant at construction time
//! - Treat empty addresses as unregistered

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Registry key of the writer node.
pub const LEADER_KEY: &str = "leader";

/// Prefix of follower keys; followers are numbered from 1.
pub const FOLLOWER_PREFIX: &str = "follower_";

/// Role of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Leader,
    /// Read-only replica with its stable 1-based index.
    Follower(u32),
}

impl Role {
    /// Registry key for this role.
    pub fn key(&self) -> String {
        match self {
            Role::Leader => LEADER_KEY.to_string(),
            Role::Follower(index) => format!("{}{}", FOLLOWER_PREFIX, index),
        }
    }

    /// Parse a registry key back into a role.
    pub fn from_key(key: &str) -> Option<Role> {
        if key == LEADER_KEY {
            return Some(Role::Leader);
        }
        let index: u32 = key.strip_prefix(FOLLOWER_PREFIX)?.parse().ok()?;
        if index == 0 {
            return None;
        }
        Some(Role::Follower(index))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// One registered backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub role: Role,
    /// `host:port`
    pub address: String,
}

impl RegistryEntry {
    pub fn leader(address: impl Into<String>) -> Self {
        Self {
            role: Role::Leader,
            address: address.into(),
        }
    }

    pub fn follower(index: u32, address: impl Into<String>) -> Self {
        Self {
            role: Role::Follower(index),
            address: address.into(),
        }
    }
}

/// Errors raised while building a snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("more than one leader entry ({first}, {second})")]
    MultipleLeaders { first: String, second: String },

    #[error("duplicate entry for {0}")]
    DuplicateRole(String),

    #[error("invalid registry key '{0}'")]
    InvalidKey(String),
}

/// A complete role → address mapping.
///
/// Snapshots are replaced wholesale; nothing mutates one after it has been
/// built, so readers holding an `Arc<Registry>` see a consistent view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    generation: u64,
    backends: BTreeMap<String, String>,
}

impl Registry {
    /// Empty registry, as created at proxy start.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from typed entries.
    pub fn from_entries(
        entries: impl IntoIterator<Item = RegistryEntry>,
        generation: u64,
    ) -> Result<Self, RegistryError> {
        let mut backends: BTreeMap<String, String> = BTreeMap::new();
        for entry in entries {
            let key = entry.role.key();
            if let Some(existing) = backends.get(&key) {
                return Err(match entry.role {
                    Role::Leader => RegistryError::MultipleLeaders {
                        first: existing.clone(),
                        second: entry.address,
                    },
                    Role::Follower(_) => RegistryError::DuplicateRole(key),
                });
            }
            backends.insert(key, entry.address);
        }
        Ok(Self { generation, backends })
    }

    /// Build a snapshot from raw key/value pairs, validating every key.
    pub fn from_map(
        map: impl IntoIterator<Item = (String, String)>,
        generation: u64,
    ) -> Result<Self, RegistryError> {
        let mut entries = Vec::new();
        for (key, address) in map {
            let role = Role::from_key(&key).ok_or(RegistryError::InvalidKey(key))?;
            entries.push(RegistryEntry { role, address });
        }
        Self::from_entries(entries, generation)
    }

    /// Address registered under `key`; empty strings count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.backends
            .get(key)
            .map(String::as_str)
            .filter(|address| !address.is_empty())
    }

    pub fn leader(&self) -> Option<&str> {
        self.get(LEADER_KEY)
    }

    pub fn follower(&self, index: u32) -> Option<&str> {
        self.get(&Role::Follower(index).key())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Raw mapping, including empty entries.
    pub fn backends(&self) -> &BTreeMap<String, String> {
        &self.backends
    }

    /// Number of entries with a usable address.
    pub fn len(&self) -> usize {
        self.backends.values().filter(|a| !a.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both snapshots route identically, ignoring generation.
    pub fn same_backends(&self, other: &Registry) -> bool {
        self.backends == other.backends
    }

    /// Same mapping stamped with a different generation.
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

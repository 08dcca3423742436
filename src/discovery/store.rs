//! Authoritative cluster-membership store.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use crate::config::DiscoveryConfig;
use crate::discovery::updater::DiscoveryError;
use crate::registry::RegistryEntry;

const MEMBERS_QUERY: &str = r#"
    SELECT node_id, role, host, port
    FROM sequencer_nodes
    WHERE stack = $1
    ORDER BY node_id
"#;

/// One row of the membership table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRow {
    pub node_id: String,
    pub role: String,
    pub host: String,
    pub port: i32,
}

impl MemberRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            node_id: row.try_get("node_id")?,
            role: row.try_get("role")?,
            host: row.try_get("host")?,
            port: row.try_get("port")?,
        })
    }
}

/// Source of the current role → address mapping.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn fetch_members(&self, stack: &str) -> Result<Vec<MemberRow>, DiscoveryError>;
}

/// PostgreSQL-backed membership store.
#[derive(Debug, Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a lazily connecting pool; an unreachable database surfaces as
    /// refresh failures, not as a startup error.
    pub fn connect_lazy(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_connections)
            .acquire_timeout(Duration::from_secs(config.query_timeout_secs))
            .connect_lazy(&config.database_url)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn fetch_members(&self, stack: &str) -> Result<Vec<MemberRow>, DiscoveryError> {
        let rows = sqlx::query(MEMBERS_QUERY)
            .bind(stack)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(MemberRow::from_row).collect::<Result<Vec<_>, sqlx::Error>>()?)
    }
}

/// Convert membership rows into registry entries.
///
/// Followers are numbered `1..n` in `node_id` order. Rows with unknown roles
/// are skipped; a row with an unusable address is an error for the whole
/// cycle.
pub fn entries_from_rows(mut rows: Vec<MemberRow>) -> Result<Vec<RegistryEntry>, DiscoveryError> {
    rows.sort_by(|a, b| a.node_id.cmp(&b.node_id));

    let mut entries = Vec::with_capacity(rows.len());
    let mut next_follower = 1u32;
    for row in rows {
        let role = row.role.trim().to_ascii_lowercase();
        if role != "leader" && role != "follower" {
            tracing::debug!(node_id = %row.node_id, role = %row.role, "Skipping node with unrouted role");
            continue;
        }

        let port = u16::try_from(row.port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| DiscoveryError::InvalidRow(format!("node {} has port {}", row.node_id, row.port)))?;
        if row.host.trim().is_empty() {
            return Err(DiscoveryError::InvalidRow(format!("node {} has no host", row.node_id)));
        }
        let address = format_address(row.host.trim(), port);

        if role == "leader" {
            entries.push(RegistryEntry::leader(address));
        } else {
            entries.push(RegistryEntry::follower(next_follower, address));
            next_follower += 1;
        }
    }
    Ok(entries)
}

fn format_address(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

//! One-shot initial leader resolution with a bounded retry budget.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

use crate::bootstrap::fleet::{FleetApi, TagFilter};
use crate::config::BootstrapConfig;
use crate::lifecycle::ShutdownSignal;
use crate::registry::{Registry, RegistryEntry, RegistryHandle};

/// Fixed-interval retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryBudget {
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            interval: Duration::from_secs(config.retry_interval_secs),
        }
    }
}

/// Bootstrap failures. All of them abort startup.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("no primary instance found after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("bootstrap cancelled by shutdown")]
    Cancelled,
}

/// Resolve the leader's `host:port` from the fleet API.
///
/// Zero matching instances, more than one, or an API error all count as a
/// failed attempt.
pub async fn resolve_initial_leader(
    fleet: &dyn FleetApi,
    filter: &TagFilter,
    leader_port: u16,
    budget: &RetryBudget,
    shutdown: &mut ShutdownSignal,
) -> Result<String, BootstrapError> {
    for attempt in 1..=budget.max_attempts {
        match fleet.primary_hosts(filter).await {
            Ok(hosts) if hosts.len() == 1 => {
                let address = join_host_port(&hosts[0], leader_port);
                tracing::info!(attempt, leader = %address, stack = %filter.stack, "Initial leader resolved");
                return Ok(address);
            }
            Ok(hosts) if hosts.is_empty() => {
                tracing::warn!(
                    attempt,
                    max_attempts = budget.max_attempts,
                    stack = %filter.stack,
                    tag = %format!("{}={}", filter.key, filter.value),
                    "No primary instance found"
                );
            }
            Ok(hosts) => {
                tracing::warn!(attempt, candidates = ?hosts, "Multiple primary instances found, refusing to pick one");
            }
            Err(e) => {
                tracing::warn!(attempt, max_attempts = budget.max_attempts, error = %e, "Fleet query failed");
            }
        }

        if attempt == budget.max_attempts {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(budget.interval) => {}
            _ = shutdown.recv() => return Err(BootstrapError::Cancelled),
        }
    }

    Err(BootstrapError::Exhausted {
        attempts: budget.max_attempts,
    })
}

/// Install `{leader: address}` as the initial registry snapshot.
pub fn seed_registry(registry: &RegistryHandle, address: &str) {
    let snapshot = Registry::from_entries(vec![RegistryEntry::leader(address)], 0)
        .unwrap_or_else(|_| Registry::empty());
    registry.install(snapshot);
}

fn join_host_port(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port).to_string(),
        Err(_) => format!("{}:{}", host, port),
    }
}

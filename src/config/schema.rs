//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::rpc::{default_write_methods, MethodMatch};

/// Root configuration for the sequencer router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request classification settings.
    pub classifier: ClassifierConfig,

    /// Registry snapshot location.
    pub registry: RegistryConfig,

    /// Discovery updater settings.
    pub discovery: DiscoveryConfig,

    /// Startup leader resolution.
    pub bootstrap: BootstrapConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum requests handled concurrently (backpressure).
    pub max_concurrent_requests: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_concurrent_requests: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Bound on reading a `/rpc` body for classification, in milliseconds.
    pub body_read_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            body_read_ms: 5_000,
        }
    }
}

/// Request classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Largest `/rpc` body buffered for method sniffing.
    pub max_body_bytes: usize,

    /// RPC methods that must reach the leader.
    pub write_methods: Vec<String>,

    /// How the RPC method is extracted from the body.
    pub rpc_method_match: MethodMatch,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024, // 1MB
            write_methods: default_write_methods(),
            rpc_method_match: MethodMatch::Pattern,
        }
    }
}

/// Registry snapshot configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Snapshot file loaded at startup and reloaded on change.
    pub snapshot_path: Option<String>,
}

/// Discovery updater configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Run the updater inside the proxy process.
    pub embedded: bool,

    /// Membership database URL (postgres://...).
    pub database_url: String,

    /// Stack whose nodes are routed to.
    pub stack: String,

    /// Polling interval in seconds.
    pub poll_interval_secs: u64,

    /// Upper bound on one membership query, in seconds.
    pub query_timeout_secs: u64,

    /// Connection pool size.
    pub pool_max_connections: u32,

    /// Snapshot file written by the standalone updater.
    pub snapshot_path: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            embedded: false,
            database_url: String::new(),
            stack: "default".to_string(),
            poll_interval_secs: 10,
            query_timeout_secs: 5,
            pool_max_connections: 2,
            snapshot_path: "registry.toml".to_string(),
        }
    }
}

/// Bootstrap resolver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Base URL of the fleet/orchestration API.
    pub fleet_endpoint: String,

    /// Stack the primary instance belongs to.
    pub stack: String,

    /// Tag identifying the primary instance.
    pub tag_key: String,
    pub tag_value: String,

    /// Port the leader serves on.
    pub leader_port: u16,

    /// Attempts before startup is aborted.
    pub max_attempts: u32,

    /// Fixed delay between attempts, in seconds.
    pub retry_interval_secs: u64,

    /// Timeout of a single fleet API call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            fleet_endpoint: "http://127.0.0.1:8700".to_string(),
            stack: "default".to_string(),
            tag_key: "role".to_string(),
            tag_value: "primary".to_string(),
            leader_port: 12346,
            max_attempts: 30,
            retry_interval_secs: 10,
            request_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder key; validation refuses it when the admin API is enabled.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [bootstrap]
            fleet_endpoint = "http://fleet.internal:8700"
            stack = "rollup-prod"
            "#,
        )
        .unwrap();
        assert_eq!(config.bootstrap.stack, "rollup-prod");
        assert_eq!(config.bootstrap.leader_port, 12346);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.classifier.rpc_method_match, MethodMatch::Pattern);
        assert!(config.registry.snapshot_path.is_none());
    }

    #[test]
    fn parses_enums() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [classifier]
            rpc_method_match = "json"
            write_methods = ["eth_sendRawTransaction"]

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.classifier.rpc_method_match, MethodMatch::Json);
        assert_eq!(config.classifier.write_methods.len(), 1);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}

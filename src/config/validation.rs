//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject unsafe combinations (admin API with the placeholder key, two
//!   registry writers)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{ProxyConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `listener.bind_address`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint and report all violations.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_concurrent_requests == 0 {
        errors.push(ValidationError::new("listener.max_concurrent_requests", "must be > 0"));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.request_secs", timeouts.request_secs),
        ("timeouts.body_read_ms", timeouts.body_read_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be > 0"));
        }
    }

    if config.classifier.max_body_bytes == 0 {
        errors.push(ValidationError::new("classifier.max_body_bytes", "must be > 0"));
    }
    if config.classifier.write_methods.is_empty() {
        errors.push(ValidationError::new("classifier.write_methods", "must list at least one method"));
    }

    let discovery = &config.discovery;
    if discovery.embedded && discovery.database_url.is_empty() {
        errors.push(ValidationError::new(
            "discovery.database_url",
            "required when discovery.embedded is true",
        ));
    }
    if discovery.stack.is_empty() {
        errors.push(ValidationError::new("discovery.stack", "must not be empty"));
    }
    if discovery.poll_interval_secs == 0 {
        errors.push(ValidationError::new("discovery.poll_interval_secs", "must be > 0"));
    }
    if discovery.query_timeout_secs == 0 {
        errors.push(ValidationError::new("discovery.query_timeout_secs", "must be > 0"));
    }
    // The registry has exactly one writer after bootstrap.
    if discovery.embedded && config.registry.snapshot_path.is_some() {
        errors.push(ValidationError::new(
            "registry.snapshot_path",
            "must be unset when discovery.embedded is true",
        ));
    }

    let bootstrap = &config.bootstrap;
    if url::Url::parse(&bootstrap.fleet_endpoint).is_err() {
        errors.push(ValidationError::new(
            "bootstrap.fleet_endpoint",
            format!("'{}' is not a valid URL", bootstrap.fleet_endpoint),
        ));
    }
    if bootstrap.stack.is_empty() {
        errors.push(ValidationError::new("bootstrap.stack", "must not be empty"));
    }
    if bootstrap.request_timeout_secs == 0 {
        errors.push(ValidationError::new("bootstrap.request_timeout_secs", "must be > 0"));
    }
    if bootstrap.max_attempts == 0 {
        errors.push(ValidationError::new("bootstrap.max_attempts", "must be > 0"));
    }
    if bootstrap.leader_port == 0 {
        errors.push(ValidationError::new("bootstrap.leader_port", "must be > 0"));
    }

    if config.observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new("admin.api_key", "must be set when the admin API is enabled"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address", value)));
    }
}

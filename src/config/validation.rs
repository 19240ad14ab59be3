//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every target builds a valid backend descriptor
//! - Validate value ranges (timeouts > 0, pool caps consistent)
//! - Detect duplicate prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no target domains configured")]
    NoTargets,

    #[error("duplicate prefix key '{0}'")]
    DuplicatePrefix(String),

    #[error("prefix key '{0}' must be a single path segment")]
    InvalidPrefix(String),

    #[error("target '{key}': {reason}")]
    InvalidTarget { key: String, reason: String },

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("per-host idle cap ({per_host}) exceeds global idle cap ({global})")]
    PoolCapMismatch { per_host: usize, global: usize },
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.target_domains.is_empty() {
        errors.push(ValidationError::NoTargets);
    }

    let mut seen = HashSet::new();
    for target in &config.target_domains {
        if !seen.insert(target.key.as_str()) {
            errors.push(ValidationError::DuplicatePrefix(target.key.clone()));
        }
        // The empty key is the single-domain catch-all.
        if target.key.contains('/') || target.key.trim() != target.key {
            errors.push(ValidationError::InvalidPrefix(target.key.clone()));
        }
        if let Err(e) = target.to_target() {
            errors.push(ValidationError::InvalidTarget {
                key: target.key.clone(),
                reason: e.to_string(),
            });
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroValue("listener.max_connections"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let timeouts = &config.timeouts;
    let transport = &config.transport;
    for (name, value) in [
        ("timeouts.read_secs", timeouts.read_secs),
        ("timeouts.write_secs", timeouts.write_secs),
        ("timeouts.idle_secs", timeouts.idle_secs),
        ("transport.connect_timeout_secs", transport.connect_timeout_secs),
        ("transport.tls_handshake_timeout_secs", transport.tls_handshake_timeout_secs),
        ("transport.response_header_timeout_secs", transport.response_header_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(name));
        }
    }

    if transport.max_idle_connections_per_host > transport.max_idle_connections {
        errors.push(ValidationError::PoolCapMismatch {
            per_host: transport.max_idle_connections_per_host,
            global: transport.max_idle_connections,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

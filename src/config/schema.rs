//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::target::{BackendTarget, TargetError};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Inbound connection timeouts.
    pub timeouts: TimeoutConfig,

    /// Outbound transport settings shared by every backend.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Ordered prefix → backend mappings.
    pub target_domains: Vec<TargetConfig>,
}

impl ProxyConfig {
    /// Build one descriptor per configured target, in configuration order.
    pub fn target_descriptors(&self) -> Result<Vec<(String, BackendTarget)>, TargetError> {
        self.target_domains
            .iter()
            .map(|t| Ok((t.key.clone(), t.to_target()?)))
            .collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Inbound timeouts, independent of the outbound transport timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for a client to send a request head.
    pub read_secs: u64,

    /// Time a response write may stall on a slow client.
    pub write_secs: u64,

    /// Keep-alive connections with no traffic for this long are closed.
    pub idle_secs: u64,

    /// How long shutdown waits for in-flight connections to drain.
    pub shutdown_grace_secs: u64,
}

impl TimeoutConfig {
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 30,
            write_secs: 30,
            idle_secs: 60,
            shutdown_grace_secs: 30,
        }
    }
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// TCP keep-alive probe interval in seconds.
    pub keepalive_secs: u64,

    /// TLS handshake timeout in seconds (https backends only).
    pub tls_handshake_timeout_secs: u64,

    /// Time to wait for response headers in seconds.
    pub response_header_timeout_secs: u64,

    /// Upper bound on waiting for `100 Continue` before sending a body.
    pub expect_continue_timeout_secs: u64,

    /// Idle pooled connections kept across all backends.
    pub max_idle_connections: usize,

    /// Idle pooled connections kept per backend host.
    pub max_idle_connections_per_host: usize,

    /// Idle pooled connections are closed after this many seconds.
    pub pool_idle_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            keepalive_secs: 30,
            tls_handshake_timeout_secs: 10,
            response_header_timeout_secs: 30,
            expect_continue_timeout_secs: 1,
            max_idle_connections: 100,
            max_idle_connections_per_host: 10,
            pool_idle_timeout_secs: 90,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
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

    /// Human-readable or JSON log lines.
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
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One routing entry: `/<key>/*` is forwarded to `<schema>://<domain>`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// First path segment that selects this backend.
    #[serde(alias = "prefix")]
    pub key: String,

    /// Backend host with optional port.
    pub domain: String,

    /// "http" or "https".
    #[serde(alias = "scheme")]
    pub schema: String,
}

impl TargetConfig {
    pub fn new(key: impl Into<String>, domain: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            domain: domain.into(),
            schema: schema.into(),
        }
    }

    pub fn to_target(&self) -> Result<BackendTarget, TargetError> {
        BackendTarget::parse(self.domain.clone(), &self.schema)
    }
}

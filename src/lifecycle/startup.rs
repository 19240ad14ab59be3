//! Startup orchestration.
//!
//! # Responsibilities
//! - Apply command-line overrides to the loaded configuration
//! - Initialize subsystems in dependency order
//! - Bind the listener and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::{ConfigError, ProxyConfig, ValidationError};
use crate::http::HttpServer;
use crate::lifecycle::{shutdown_signal, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the proxy described by `config` until SIGINT or SIGTERM.
pub async fn run(mut config: ProxyConfig, bind_override: Option<String>) -> Result<(), StartupError> {
    if let Some(bind) = bind_override {
        config.listener.bind_address = bind;
    }

    let server = HttpServer::new(config.clone())?;

    for (prefix, target) in server.router().backends() {
        if prefix.is_empty() {
            tracing::info!("Proxy mapping: /* -> {}", target);
        } else {
            tracing::info!("Proxy mapping: /{}/* -> {}", prefix, target);
        }
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse().map_err(|_| {
            ConfigError::Validation(vec![ValidationError::InvalidMetricsAddress(
                config.observability.metrics_address.clone(),
            )])
        })?;
        metrics::init_metrics(addr)?;
    }

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let signals = shutdown.clone();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        signals.trigger();
    });

    server.run(listener, rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

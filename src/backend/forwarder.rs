//! Single-backend forwarder.
//!
//! # Responsibilities
//! - Forward one request to one fixed backend through the shared transport
//! - Map transport failures to exactly one client response
//! - Hand protocol upgrades to the splice task
//!
//! # Design Decisions
//! - Built once per registered prefix and reused, so pooled connections to
//!   the backend are actually reused
//! - No retries, no failover

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};

use crate::backend::target::BackendTarget;
use crate::backend::transport::Transport;
use crate::http::request::{self, is_upgrade_request};
use crate::http::response::{self, ProxyError};
use crate::http::upgrade;

/// Forwards requests for one prefix to its backend.
#[derive(Debug, Clone)]
pub struct Forwarder {
    prefix: String,
    target: BackendTarget,
    transport: Transport,
}

impl Forwarder {
    pub fn new(prefix: impl Into<String>, target: BackendTarget, transport: Transport) -> Self {
        Self {
            prefix: prefix.into(),
            target,
            transport,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn target(&self) -> &BackendTarget {
        &self.target
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send `request` (path already rewritten) to the backend and relay the
    /// response.
    pub async fn forward(&self, mut request: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let client_upgrade = if is_upgrade_request(request.headers()) {
            Some(hyper::upgrade::on(&mut request))
        } else {
            None
        };

        let outbound = request::direct(request, &self.target)?;

        tracing::debug!(
            method = %outbound.method(),
            uri = %outbound.uri(),
            headers = ?outbound.headers(),
            "Forwarding to backend"
        );

        let mut response = match self.transport.send(outbound).await {
            Ok(response) => response,
            Err(failure) => {
                tracing::warn!(
                    prefix = %self.prefix,
                    domain = %self.target.domain(),
                    kind = failure.kind(),
                    error = %failure,
                    "Upstream request failed"
                );
                return Err(ProxyError::from_failure(failure, self.target.domain()));
            }
        };

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            if let Some(client) = client_upgrade {
                let backend = hyper::upgrade::on(&mut response);
                upgrade::splice(client, backend, self.target.domain().to_string());
            }
        }

        Ok(response::relay(response))
    }
}

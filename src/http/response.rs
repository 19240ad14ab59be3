//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay backend responses without touching end-to-end headers
//! - Map routing and transport failures to client-facing statuses
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Hop-by-hop headers stripped automatically
//! - Backend timeouts result in 504 Gateway Timeout, every other transport
//!   failure in 502 Bad Gateway
//! - Error bodies are plain text, one line

use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;

use crate::backend::transport::TransportFailure;
use crate::http::request::strip_hop_by_hop;

/// Every way a proxied request can fail before a backend response is relayed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid path")]
    InvalidPath,

    #[error("No proxy configured for path: {0}")]
    UnknownPrefix(String),

    #[error("Domain {domain} cannot be resolved")]
    Unresolvable { domain: String },

    #[error("Domain {domain} is unreachable")]
    Unreachable { domain: String },

    #[error("Request to {domain} timed out")]
    Timeout { domain: String },

    #[error("Proxy error: {detail}")]
    Upstream { detail: String },
}

impl ProxyError {
    /// Map a classified transport failure for `domain`.
    pub fn from_failure(failure: TransportFailure, domain: &str) -> Self {
        let domain = domain.to_string();
        match failure {
            TransportFailure::Unresolvable => ProxyError::Unresolvable { domain },
            TransportFailure::Refused => ProxyError::Unreachable { domain },
            TransportFailure::Timeout => ProxyError::Timeout { domain },
            TransportFailure::Other(detail) => ProxyError::Upstream { detail },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidPath => StatusCode::BAD_REQUEST,
            ProxyError::UnknownPrefix(_) => StatusCode::NOT_FOUND,
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Unresolvable { .. }
            | ProxyError::Unreachable { .. }
            | ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether the failure came from talking to a backend rather than from
    /// routing the request.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, ProxyError::InvalidPath | ProxyError::UnknownPrefix(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidPath => "invalid_path",
            ProxyError::UnknownPrefix(_) => "unknown_prefix",
            ProxyError::Unresolvable { .. } => "dns",
            ProxyError::Unreachable { .. } => "refused",
            ProxyError::Timeout { .. } => "timeout",
            ProxyError::Upstream { .. } => "other",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status(),
            [
                (
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                ),
                (
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ),
            ],
            format!("{}\n", self),
        )
            .into_response()
    }
}

/// Turn a backend response into the client response.
///
/// Status, end-to-end headers and the streaming body pass through unchanged.
pub fn relay(response: Response<Incoming>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    let switching = parts.status == StatusCode::SWITCHING_PROTOCOLS;
    strip_hop_by_hop(&mut parts.headers, switching);
    Response::from_parts(parts, Body::new(body))
}

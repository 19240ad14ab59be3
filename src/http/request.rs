//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a request ID for log correlation
//! - Rewrite an inbound request into the request sent to a backend
//! - Apply the header policy: set `Host`, drop forwarding headers, keep the rest
//!
//! # Design Decisions
//! - `Host` is the only header the proxy sets itself
//! - `X-Forwarded-For` and `X-Real-IP` are removed, never synthesized
//! - Hop-by-hop headers belong to one connection and are not copied across
//! - The request ID lives in the log span only; it is not forwarded

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::uri::{self, PathAndQuery};
use axum::http::{Request, Uri, Version};
use uuid::Uuid;

use crate::backend::target::BackendTarget;
use crate::http::response::ProxyError;

pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub static X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Connection-scoped headers (RFC 9110 §7.6.1) plus the legacy ones proxies
/// still see in the wild.
static HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Per-request correlation ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when the client asks to switch protocols on this connection.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers.contains_key(header::UPGRADE) && connection_has_token(headers, "upgrade")
}

fn connection_has_token(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
///
/// With `keep_upgrade`, the `Upgrade` header survives and `Connection` is
/// reduced to `upgrade` so the protocol switch can cross the proxy.
pub fn strip_hop_by_hop(headers: &mut HeaderMap, keep_upgrade: bool) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|t| HeaderName::from_bytes(t.trim().as_bytes()).ok())
        .collect();

    let upgrade: Vec<HeaderValue> = if keep_upgrade {
        headers.get_all(header::UPGRADE).iter().cloned().collect()
    } else {
        Vec::new()
    };

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }

    if keep_upgrade && !upgrade.is_empty() {
        headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
        for value in upgrade {
            headers.append(header::UPGRADE, value);
        }
    }
}

/// Rewrite `request` to target `backend`.
///
/// The path and query already reflect the routing decision; only scheme,
/// authority, `Host`, and connection-level headers change here.
pub fn direct(request: Request<Body>, backend: &BackendTarget) -> Result<Request<Body>, ProxyError> {
    let (mut parts, body) = request.into_parts();

    let upgrade = is_upgrade_request(&parts.headers);
    strip_hop_by_hop(&mut parts.headers, upgrade);
    parts.headers.remove(&X_FORWARDED_FOR);
    parts.headers.remove(&X_REAL_IP);

    let host = HeaderValue::from_str(backend.domain()).map_err(|e| ProxyError::Upstream {
        detail: format!("invalid host header for {}: {}", backend.domain(), e),
    })?;
    parts.headers.insert(header::HOST, host);

    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    let mut uri_parts = uri::Parts::default();
    uri_parts.scheme = Some(backend.scheme().to_uri_scheme());
    uri_parts.authority = Some(backend.authority().clone());
    uri_parts.path_and_query = Some(path_and_query);
    parts.uri = Uri::from_parts(uri_parts).map_err(|e| ProxyError::Upstream {
        detail: format!("invalid backend uri: {}", e),
    })?;

    // Backends are spoken to over HTTP/1.1 whatever the inbound version was.
    parts.version = Version::HTTP_11;

    Ok(Request::from_parts(parts, body))
}

/// Best-effort client address for logging.
///
/// Prefers the forwarding headers a client supplied, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(xff) = headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        if let Some(first) = xff.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real) = headers.get(&X_REAL_IP).and_then(|v| v.to_str().ok()) {
        if !real.trim().is_empty() {
            return real.trim().to_string();
        }
    }
    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

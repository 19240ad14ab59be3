//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store one forwarder per registered prefix
//! - Look up the forwarder for a request path, rewrite the path, delegate
//! - Return explicit routing errors (400 / 404) rather than a silent default
//!
//! # Design Decisions
//! - The prefix map is an immutable snapshot swapped atomically; lookups
//!   never lock and registration is safe while serving
//! - Forwarders are built at registration, so every request for a prefix
//!   shares the same transport pool
//! - The empty prefix is the single-domain catch-all: it receives any request
//!   no other prefix claims, with its path untouched

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Request, Response, Uri};
use axum::response::IntoResponse;

use crate::backend::{BackendTarget, Forwarder, TargetError, Transport, TransportOptions};
use crate::config::ProxyConfig;
use crate::http::response::ProxyError;
use crate::observability::metrics;
use crate::routing::matcher::{split_prefix, with_query};

type RouteTable = HashMap<String, Arc<Forwarder>>;

/// Outcome of a successful lookup.
#[derive(Debug, Clone)]
pub struct Route {
    pub forwarder: Arc<Forwarder>,
    /// Path the backend will see.
    pub rewritten_path: String,
}

/// Path-prefix router.
#[derive(Debug)]
pub struct PrefixRouter {
    routes: ArcSwap<RouteTable>,
    transport: Transport,
}

impl PrefixRouter {
    /// Create an empty router whose forwarders will share `transport`.
    pub fn new(transport: Transport) -> Self {
        Self {
            routes: ArcSwap::from_pointee(HashMap::new()),
            transport,
        }
    }

    /// Build the transport and register every configured target, in order.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, TargetError> {
        let descriptors = config.target_descriptors()?;
        let hosts = descriptors
            .iter()
            .map(|(_, t)| t.authority().as_str())
            .collect::<HashSet<_>>()
            .len();

        let router = Self::new(Transport::new(TransportOptions::from(&config.transport), hosts));
        for (prefix, target) in descriptors {
            router.add_backend(prefix, target);
        }
        Ok(router)
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Register `target` under `prefix`, replacing any previous mapping.
    ///
    /// Requests that start after this returns are routed to `target`.
    /// The idle pool split was sized when the transport was built, so hosts
    /// added here do not lower the per-host idle cap.
    /// Returns the descriptor that was replaced, if any.
    pub fn add_backend(&self, prefix: impl Into<String>, target: BackendTarget) -> Option<BackendTarget> {
        let prefix = prefix.into();
        let forwarder = Arc::new(Forwarder::new(prefix.clone(), target, self.transport.clone()));

        let previous = self.routes.rcu(|current| {
            let mut next = RouteTable::clone(current);
            next.insert(prefix.clone(), forwarder.clone());
            next
        });

        tracing::info!(
            prefix = %prefix,
            target = %forwarder.target(),
            replaced = previous.contains_key(&prefix),
            "Backend registered"
        );

        previous.get(&prefix).map(|f| f.target().clone())
    }

    /// Drop the mapping for `prefix`.
    pub fn remove_backend(&self, prefix: &str) -> Option<BackendTarget> {
        let previous = self.routes.rcu(|current| {
            let mut next = RouteTable::clone(current);
            next.remove(prefix);
            next
        });
        previous.get(prefix).map(|f| f.target().clone())
    }

    pub fn get(&self, prefix: &str) -> Option<Arc<Forwarder>> {
        self.routes.load().get(prefix).cloned()
    }

    /// Registered forwarders, ordered by prefix.
    pub fn forwarders(&self) -> Vec<Arc<Forwarder>> {
        let mut all: Vec<_> = self.routes.load().values().cloned().collect();
        all.sort_by(|a, b| a.prefix().cmp(b.prefix()));
        all
    }

    /// Registered `(prefix, descriptor)` pairs, ordered by prefix.
    pub fn backends(&self) -> Vec<(String, BackendTarget)> {
        self.forwarders()
            .into_iter()
            .map(|f| (f.prefix().to_string(), f.target().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.load().is_empty()
    }

    /// Decide where `path` goes.
    pub fn resolve(&self, path: &str) -> Result<Route, ProxyError> {
        let routes = self.routes.load();
        let fallback = |path: &str| {
            routes.get("").map(|f| Route {
                forwarder: f.clone(),
                rewritten_path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            })
        };

        match split_prefix(path) {
            Some(m) => {
                if let Some(forwarder) = routes.get(m.segment) {
                    return Ok(Route {
                        forwarder: forwarder.clone(),
                        rewritten_path: m.rewritten_path().to_string(),
                    });
                }
                fallback(path).ok_or_else(|| ProxyError::UnknownPrefix(m.segment.to_string()))
            }
            None => fallback(path).ok_or(ProxyError::InvalidPath),
        }
    }

    /// Route one request and produce exactly one response.
    pub async fn route(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let (prefix, result) = match self.resolve(&path) {
            Ok(route) => {
                let forwarder = route.forwarder;
                tracing::info!(
                    method = %method,
                    path = %path,
                    prefix = %forwarder.prefix(),
                    domain = %forwarder.target().domain(),
                    rewritten_path = %route.rewritten_path,
                    "Routing request"
                );

                let result = match rewrite_path(request, &route.rewritten_path) {
                    Ok(request) => forwarder.forward(request).await,
                    Err(e) => Err(e),
                };
                (forwarder.prefix().to_string(), result)
            }
            Err(e) => {
                tracing::warn!(method = %method, path = %path, error = %e, "Request not routed");
                (String::from("-"), Err(e))
            }
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                if e.is_upstream() {
                    metrics::record_error(&prefix, e.kind());
                }
                e.into_response()
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), &prefix, start);
        response
    }
}

fn rewrite_path(mut request: Request<Body>, path: &str) -> Result<Request<Body>, ProxyError> {
    let invalid = |e: &dyn std::fmt::Display| ProxyError::Upstream {
        detail: format!("invalid rewritten path '{}': {}", path, e),
    };

    let path_and_query = with_query(path, request.uri().query()).map_err(|e| invalid(&e))?;
    let mut parts = request.uri().clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    *request.uri_mut() = Uri::from_parts(parts).map_err(|e| invalid(&e))?;
    Ok(request)
}

//! Backend reachability probe.
//!
//! # Responsibilities
//! - Issue `GET scheme://domain/` to a backend through the shared transport
//! - Report any answer as healthy and any transport failure as unreachable
//!
//! # Design Decisions
//! - One probe per backend, on demand; nothing runs in the request path
//! - The response status is reported, not judged: a 500 still proves the
//!   backend is reachable

use std::fmt;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};

use crate::backend::Forwarder;
use crate::resilience::timeouts::within;
use crate::routing::PrefixRouter;

const PROBE_USER_AGENT: &str = concat!("prefix-proxy/", env!("CARGO_PKG_VERSION"));

/// Result of probing one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy { status: StatusCode },
    Unreachable { error: String },
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy { .. })
    }
}

/// A probe outcome tied to the backend it describes.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub prefix: String,
    pub domain: String,
    pub outcome: ProbeOutcome,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            ProbeOutcome::Healthy { status } => {
                write!(f, "Domain {} is healthy (Status: {})", self.domain, status.as_u16())
            }
            ProbeOutcome::Unreachable { error } => {
                write!(f, "Domain {} is unreachable: {}", self.domain, error)
            }
        }
    }
}

impl Forwarder {
    /// Probe this forwarder's backend root, giving up after `timeout`.
    pub async fn probe(&self, timeout: Duration) -> ProbeOutcome {
        let target = self.target();
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("{}/", target.base_url()))
            .header(header::HOST, target.domain())
            .header(header::USER_AGENT, PROBE_USER_AGENT)
            .body(Body::empty());

        let request = match request {
            Ok(request) => request,
            Err(e) => {
                return ProbeOutcome::Unreachable {
                    error: e.to_string(),
                }
            }
        };

        match within(timeout, self.transport().send(request)).await {
            Some(Ok(response)) => ProbeOutcome::Healthy {
                status: response.status(),
            },
            Some(Err(failure)) => ProbeOutcome::Unreachable {
                error: failure.to_string(),
            },
            None => ProbeOutcome::Unreachable {
                error: format!("no response within {}s", timeout.as_secs()),
            },
        }
    }
}

/// Probe every registered backend concurrently, reports ordered by prefix.
pub async fn probe_all(router: &PrefixRouter, timeout: Duration) -> Vec<ProbeReport> {
    let mut tasks = tokio::task::JoinSet::new();
    for (index, forwarder) in router.forwarders().into_iter().enumerate() {
        tasks.spawn(async move {
            let outcome = forwarder.probe(timeout).await;
            (
                index,
                ProbeReport {
                    prefix: forwarder.prefix().to_string(),
                    domain: forwarder.target().domain().to_string(),
                    outcome,
                },
            )
        });
    }

    let mut reports = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(e) => tracing::error!(error = %e, "Probe task failed"),
        }
    }
    reports.sort_by_key(|(index, _)| *index);

    reports
        .into_iter()
        .map(|(_, report)| {
            if report.outcome.is_healthy() {
                tracing::info!(prefix = %report.prefix, "{}", report);
            } else {
                tracing::warn!(prefix = %report.prefix, "{}", report);
            }
            report
        })
        .collect()
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, prefix
//! - `proxy_request_duration_seconds` (histogram): latency by prefix
//! - `proxy_upstream_errors_total` (counter): backend failures by prefix and
//!   kind; routing errors (400 / 404) are not counted here
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, prefix: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "prefix" => prefix.to_string()
    )
    .increment(1);

    histogram!("proxy_request_duration_seconds", "prefix" => prefix.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a request that failed talking to its backend.
pub fn record_error(prefix: &str, kind: &'static str) {
    counter!(
        "proxy_upstream_errors_total",
        "prefix" => prefix.to_string(),
        "kind" => kind
    )
    .increment(1);
}

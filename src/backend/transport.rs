//! Outbound transport shared by every forwarder.
//!
//! # Responsibilities
//! - Own the pooled HTTP/HTTPS client (one pool for all backends)
//! - Apply connect, keep-alive, TLS handshake and response header timeouts
//! - Classify transport failures into resolution / refusal / timeout / other
//!
//! # Design Decisions
//! - Certificate verification is always on (webpki roots); there is no
//!   switch to disable it
//! - Idle pool is capped per host; the per-host cap is lowered when needed so
//!   that `hosts × per_host` never exceeds the global cap. The split is fixed
//!   when the transport is built, so the cap covers the configured backends;
//!   hosts added later with `add_backend` share the same per-host cap
//! - The response header timer starts once the request body has been sent,
//!   so slow uploads are bounded by the inbound timeouts only
//! - Cloning a `Transport` shares the pool

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper::body::Incoming;
use hyper_rustls::ConfigBuilderExt;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::ClientConfig;

use crate::config::TransportConfig;
use crate::resilience::timeouts::{notify_on_end, TimedTlsConnector};

type Connector = TimedTlsConnector<HttpConnector>;

/// Tunables for the outbound transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub keepalive: Duration,
    pub tls_handshake_timeout: Duration,
    pub response_header_timeout: Duration,
    /// The client streams request bodies without waiting for `100 Continue`,
    /// so this bound always holds.
    pub expect_continue_timeout: Duration,
    pub max_idle_connections: usize,
    pub max_idle_connections_per_host: usize,
    pub pool_idle_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for TransportOptions {
    fn from(config: &TransportConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            keepalive: Duration::from_secs(config.keepalive_secs),
            tls_handshake_timeout: Duration::from_secs(config.tls_handshake_timeout_secs),
            response_header_timeout: Duration::from_secs(config.response_header_timeout_secs),
            expect_continue_timeout: Duration::from_secs(config.expect_continue_timeout_secs),
            max_idle_connections: config.max_idle_connections,
            max_idle_connections_per_host: config.max_idle_connections_per_host,
            pool_idle_timeout: Duration::from_secs(config.pool_idle_timeout_secs),
        }
    }
}

impl TransportOptions {
    /// Per-host idle cap that keeps the total within the global cap for
    /// `hosts` distinct backends.
    ///
    /// Only the hosts known at construction are counted.
    pub fn idle_per_host(&self, hosts: usize) -> usize {
        let share = self.max_idle_connections / hosts.max(1);
        self.max_idle_connections_per_host.min(share.max(1))
    }
}

/// Why an outbound call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The backend host name could not be resolved.
    Unresolvable,
    /// The backend actively refused the connection.
    Refused,
    /// Connect, TLS handshake or response header wait exceeded its deadline.
    Timeout,
    /// Anything else, with the rendered error chain.
    Other(String),
}

impl TransportFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportFailure::Unresolvable => "dns",
            TransportFailure::Refused => "refused",
            TransportFailure::Timeout => "timeout",
            TransportFailure::Other(_) => "other",
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Unresolvable => f.write_str("name resolution failed"),
            TransportFailure::Refused => f.write_str("connection refused"),
            TransportFailure::Timeout => f.write_str("timed out"),
            TransportFailure::Other(detail) => f.write_str(detail),
        }
    }
}

/// Walk an error's source chain and decide which failure category it is.
pub fn classify(err: &(dyn StdError + 'static)) -> TransportFailure {
    let mut refused = false;
    let mut timed_out = false;

    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => refused = true,
                io::ErrorKind::TimedOut => timed_out = true,
                _ => {}
            }
        }

        let message = e.to_string().to_ascii_lowercase();
        if message.contains("dns error")
            || message.contains("failed to lookup address")
            || message.contains("no such host")
        {
            return TransportFailure::Unresolvable;
        }
        if message.contains("connection refused") {
            refused = true;
        }
        if message.contains("timed out") || message.contains("timeout") {
            timed_out = true;
        }

        current = e.source();
    }

    if refused {
        TransportFailure::Refused
    } else if timed_out {
        TransportFailure::Timeout
    } else {
        TransportFailure::Other(render_chain(err))
    }
}

/// `outer: inner: root` rendering of an error chain.
fn render_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let message = e.to_string();
        if !rendered.ends_with(&message) {
            rendered.push_str(": ");
            rendered.push_str(&message);
        }
        current = e.source();
    }
    rendered
}

/// Pooled outbound client.
#[derive(Clone)]
pub struct Transport {
    client: Client<Connector, Body>,
    options: TransportOptions,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("options", &self.options)
            .finish()
    }
}

impl Transport {
    /// Build a transport sized for `hosts` distinct backends.
    pub fn new(options: TransportOptions, hosts: usize) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(options.connect_timeout));
        http.set_keepalive(Some(options.keepalive));

        let mut tls = ClientConfig::builder()
            .with_webpki_roots()
            .with_no_client_auth();
        tls.alpn_protocols = vec![b"http/1.1".to_vec()];

        let connector = TimedTlsConnector::new(http, Arc::new(tls), options.tls_handshake_timeout);

        let per_host = options.idle_per_host(hosts);
        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(options.pool_idle_timeout)
            .pool_max_idle_per_host(per_host)
            .build(connector);

        tracing::debug!(
            hosts,
            idle_per_host = per_host,
            connect_timeout = ?options.connect_timeout,
            tls_handshake_timeout = ?options.tls_handshake_timeout,
            response_header_timeout = ?options.response_header_timeout,
            "Outbound transport ready"
        );

        Self { client, options }
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Send one request and wait for the response head.
    ///
    /// The response header timeout runs from the moment the request body is
    /// fully sent. No retries. Dropping the returned future cancels the call.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Incoming>, TransportFailure> {
        let (parts, body) = request.into_parts();
        let (body, body_sent) = notify_on_end(body);
        let response = self.client.request(Request::from_parts(parts, body));

        let limit = self.options.response_header_timeout;
        let header_deadline = async move {
            let _ = body_sent.await;
            tokio::time::sleep(limit).await;
        };

        tokio::select! {
            result = response => result.map_err(|e| classify(&e)),
            _ = header_deadline => Err(TransportFailure::Timeout),
        }
    }
}

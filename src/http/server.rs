//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Build the Axum Router: one fallback handler that hands every request to
//!   the prefix router
//! - Serve HTTP/1.1 and HTTP/2 on accepted connections, upgrades included
//! - Enforce inbound timeouts: request head read, stalled writes, idle
//!   keep-alive
//! - Stop accepting on shutdown and drain open connections
//!
//! # Design Decisions
//! - The accept loop is written out rather than using `axum::serve`, because
//!   the inbound timeouts need hooks on each connection
//! - Idle connections are closed with hyper's graceful shutdown, never cut
//!   mid-response

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Response},
    Router,
};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::{validate_config, ConfigError, ProxyConfig, TimeoutConfig};
use crate::http::request::{client_ip, RequestId};
use crate::net::connection::{ConnectionActivity, ConnectionGuard, ConnectionTracker, TrackedStream};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::routing::PrefixRouter;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<PrefixRouter>,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    app: Router,
    router: Arc<PrefixRouter>,
    timeouts: TimeoutConfig,
}

impl HttpServer {
    /// Validate `config` and build the router and transport it describes.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let router = Arc::new(PrefixRouter::from_config(&config)?);
        Ok(Self::with_router(router, config.timeouts))
    }

    /// Serve an existing router.
    pub fn with_router(router: Arc<PrefixRouter>, timeouts: TimeoutConfig) -> Self {
        let app = build_app(Arc::clone(&router));
        Self {
            app,
            router,
            timeouts,
        }
    }

    /// Handle for registering backends while the server runs.
    pub fn router(&self) -> Arc<PrefixRouter> {
        Arc::clone(&self.router)
    }

    /// Accept and serve connections until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.router.len(),
            "HTTP server starting"
        );

        let tracker = ConnectionTracker::new();
        let (drain_tx, drain_rx) = watch::channel(false);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(ListenerError::LimiterClosed) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                            continue;
                        }
                    };

                    let connection = Connection {
                        peer,
                        _permit: permit,
                        guard: tracker.track(),
                        app: self.app.clone(),
                        timeouts: self.timeouts.clone(),
                        drain: drain_rx.clone(),
                    };
                    tokio::spawn(connection.serve(stream));
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);
        let _ = drain_tx.send(true);

        let open = tracker.active_count();
        if open > 0 {
            tracing::info!(connections = open, "Draining connections");
            if !tracker.wait_for_drain(self.timeouts.shutdown_grace()).await {
                tracing::warn!(
                    connections = tracker.active_count(),
                    "Grace period elapsed with connections still open"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with its middleware layers.
pub fn build_app(router: Arc<PrefixRouter>) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .with_state(AppState { router })
        .layer(TraceLayer::new_for_http())
}

/// Every request lands here; the prefix router decides the rest.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let span = tracing::info_span!(
        "request",
        request_id = %RequestId::new(),
        client_ip = %client_ip(request.headers(), peer),
    );

    state.router.route(request).instrument(span).await
}

/// One accepted connection and everything it holds until it closes.
struct Connection {
    peer: SocketAddr,
    _permit: ConnectionPermit,
    guard: ConnectionGuard,
    app: Router,
    timeouts: TimeoutConfig,
    drain: watch::Receiver<bool>,
}

impl Connection {
    async fn serve(mut self, stream: TcpStream) {
        let peer = self.peer;
        let activity = ConnectionActivity::new();
        let io = TokioIo::new(TrackedStream::new(stream, Arc::clone(&activity), self.timeouts.write()));

        let service = {
            let app = self.app.clone();
            let activity = Arc::clone(&activity);
            service_fn(move |mut request: Request<Incoming>| {
                let app = app.clone();
                let in_flight = activity.request_started();
                request.extensions_mut().insert(ConnectInfo(peer));
                async move {
                    let response = app.oneshot(request.map(Body::new)).await;
                    drop(in_flight);
                    response
                }
            })
        };

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.timeouts.read());

        let conn = builder.serve_connection_with_upgrades(io, service);
        tokio::pin!(conn);

        let idle = self.timeouts.idle();
        let mut idle_check = tokio::time::interval((idle / 4).max(Duration::from_millis(100)));
        let mut closing = false;

        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!(peer = %peer, connection_id = %self.guard.id(), error = %e, "Connection error");
                    }
                    break;
                }
                _ = self.drain.changed(), if !closing => {
                    conn.as_mut().graceful_shutdown();
                    closing = true;
                }
                _ = idle_check.tick(), if !closing => {
                    if activity.in_flight() == 0 && activity.idle_for() >= idle {
                        tracing::debug!(peer = %peer, connection_id = %self.guard.id(), "Closing idle connection");
                        conn.as_mut().graceful_shutdown();
                        closing = true;
                    }
                }
            }
        }
    }
}

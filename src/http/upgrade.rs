//! Protocol upgrade pass-through.
//!
//! # Responsibilities
//! - Splice a client's upgraded connection to the backend's once the backend
//!   answers `101 Switching Protocols`
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Proxy ←──── raw bytes ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Byte-level copy; the proxy never parses the upgraded protocol
//! - Either side closing ends the tunnel

use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::io::copy_bidirectional;

/// Spawn a task joining both halves of an upgraded exchange.
pub fn splice(client: OnUpgrade, backend: OnUpgrade, domain: String) {
    tokio::spawn(async move {
        let (client, backend) = match tokio::try_join!(client, backend) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(domain = %domain, error = %e, "Upgrade failed");
                return;
            }
        };

        let mut client = TokioIo::new(client);
        let mut backend = TokioIo::new(backend);
        match copy_bidirectional(&mut client, &mut backend).await {
            Ok((to_backend, to_client)) => {
                tracing::debug!(
                    domain = %domain,
                    bytes_to_backend = to_backend,
                    bytes_to_client = to_client,
                    "Upgraded connection closed"
                );
            }
            Err(e) => {
                tracing::debug!(domain = %domain, error = %e, "Upgraded connection aborted");
            }
        }
    });
}

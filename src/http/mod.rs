//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper connection, Axum fallback handler, request span)
//!     → [routing layer picks the forwarder]
//!     → request.rs (header policy, absolute backend URI)
//!     → [transport sends]
//!     → response.rs (relay, or map the failure to a text/plain status)
//!     → upgrade.rs (splice on 101 Switching Protocols)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod upgrade;

pub use request::RequestId;
pub use response::ProxyError;
pub use server::HttpServer;

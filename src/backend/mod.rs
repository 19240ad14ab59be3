//! Backend subsystem.
//!
//! # Data Flow
//! ```text
//! Routed request (path already rewritten)
//!     → forwarder.rs (director + error mapping, one per prefix)
//!     → transport.rs (shared pool, timeouts, TLS)
//!     → backend described by target.rs
//! ```

pub mod forwarder;
pub mod target;
pub mod transport;

pub use forwarder::Forwarder;
pub use target::{BackendTarget, Scheme, TargetError};
pub use transport::{Transport, TransportFailure, TransportOptions};

//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (lifecycle tracking, activity, write deadline)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Plain TCP only; TLS is spoken on the outbound side

pub mod connection;
pub mod listener;

pub use connection::{ConnectionActivity, ConnectionTracker, TrackedStream};
pub use listener::{Listener, ListenerError};

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (connect + TLS handshake deadline, response header deadline)
//!     → On failure: classified once and mapped to 502/504
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed outbound call yields exactly one mapped response

pub mod timeouts;

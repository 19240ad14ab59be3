//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → matcher.rs (split first segment, rebuild remainder)
//!     → router.rs (prefix lookup in current snapshot)
//!     → Forwarder for the prefix, or 400 / 404
//!
//! Registration (startup or runtime):
//!     (prefix, BackendTarget)
//!     → build Forwarder on the shared transport
//!     → swap in a new snapshot (last write wins)
//! ```
//!
//! # Design Decisions
//! - Exact, case-sensitive match on the first path segment
//! - No regex, no longest-prefix search
//! - Lookups read a snapshot and never block registration

pub mod matcher;
pub mod router;

pub use router::{PrefixRouter, Route};

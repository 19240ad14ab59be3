//! Backend health probing.
//!
//! Used by the `check` command; the request path never consults it.

pub mod probe;

pub use probe::{probe_all, ProbeOutcome, ProbeReport};

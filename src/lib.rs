//! Path-prefix routed HTTP reverse proxy.
//!
//! `/<prefix>/<rest>` is forwarded to the backend registered for `<prefix>`
//! as `/<rest>`, with the backend's domain as `Host`.

pub mod backend;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use backend::{BackendTarget, Forwarder, Scheme};
pub use config::schema::ProxyConfig;
pub use http::{HttpServer, ProxyError};
pub use lifecycle::Shutdown;
pub use routing::PrefixRouter;

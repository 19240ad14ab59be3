//! Backend target descriptor.
//!
//! # Responsibilities
//! - Name one backend: domain (host with optional port) and URL scheme
//! - Validate both at construction so request-time URI building cannot fail
//!
//! # Design Decisions
//! - Pure data, immutable once built
//! - `preserve_path` is carried as configuration surface only; forwarding
//!   always strips the routing prefix

use std::fmt;
use std::str::FromStr;

use axum::http::uri::{Authority, Scheme as UriScheme};
use serde::{Deserialize, Serialize};

/// URL scheme used to reach a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub(crate) fn to_uri_scheme(self) -> UriScheme {
        match self {
            Scheme::Http => UriScheme::HTTP,
            Scheme::Https => UriScheme::HTTPS,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(TargetError::InvalidScheme(other.to_string())),
        }
    }
}

/// Error returned when a descriptor cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("backend domain must not be empty")]
    EmptyDomain,

    #[error("invalid backend domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("unsupported scheme '{0}' (expected http or https)")]
    InvalidScheme(String),
}

/// One backend a routing prefix forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    domain: String,
    authority: Authority,
    scheme: Scheme,
    preserve_path: bool,
}

impl BackendTarget {
    /// Build a descriptor, rejecting empty or malformed domains.
    pub fn new(domain: impl Into<String>, scheme: Scheme) -> Result<Self, TargetError> {
        let domain = domain.into();
        if domain.trim().is_empty() {
            return Err(TargetError::EmptyDomain);
        }

        let authority = Authority::from_str(&domain).map_err(|e| TargetError::InvalidDomain {
            domain: domain.clone(),
            reason: e.to_string(),
        })?;

        // An authority with userinfo would leak credentials into the Host header.
        if authority.as_str().contains('@') {
            return Err(TargetError::InvalidDomain {
                domain,
                reason: "userinfo is not allowed".to_string(),
            });
        }

        Ok(Self {
            domain,
            authority,
            scheme,
            preserve_path: true,
        })
    }

    /// Parse the scheme from its configuration spelling.
    pub fn parse(domain: impl Into<String>, scheme: &str) -> Result<Self, TargetError> {
        Self::new(domain, scheme.parse()?)
    }

    pub fn with_preserve_path(mut self, preserve_path: bool) -> Self {
        self.preserve_path = preserve_path;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn preserve_path(&self) -> bool {
        self.preserve_path
    }

    /// Base URL of the backend, e.g. `https://api.example.com`.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.domain)
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_targets() {
        let t = BackendTarget::parse("api.example.com", "https").unwrap();
        assert_eq!(t.domain(), "api.example.com");
        assert_eq!(t.scheme(), Scheme::Https);
        assert!(t.preserve_path());
        assert_eq!(t.base_url(), "https://api.example.com");

        let t = BackendTarget::parse("127.0.0.1:3000", "http").unwrap();
        assert_eq!(t.authority().port_u16(), Some(3000));
        assert_eq!(t.to_string(), "http://127.0.0.1:3000");
    }

    #[test]
    fn test_rejects_bad_scheme() {
        let err = BackendTarget::parse("api.example.com", "ftp").unwrap_err();
        assert_eq!(err, TargetError::InvalidScheme("ftp".into()));

        // Scheme matching is exact.
        assert!(BackendTarget::parse("api.example.com", "HTTPS").is_err());
    }

    #[test]
    fn test_rejects_bad_domain() {
        assert_eq!(
            BackendTarget::new("", Scheme::Http).unwrap_err(),
            TargetError::EmptyDomain
        );
        assert!(BackendTarget::new("   ", Scheme::Http).is_err());
        assert!(BackendTarget::new("api.example.com/path", Scheme::Http).is_err());
        assert!(BackendTarget::new("user:pw@api.example.com", Scheme::Http).is_err());
    }

    #[test]
    fn test_scheme_serde_lowercase() {
        let s: Scheme = serde_yaml::from_str("https").unwrap();
        assert_eq!(s, Scheme::Https);
        assert!(serde_yaml::from_str::<Scheme>("gopher").is_err());
    }
}

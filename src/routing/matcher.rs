//! Dispatch key matching.
//!
//! # Responsibilities
//! - Normalize hosts (lower-case, port stripped)
//! - Match and strip path prefixes
//!
//! # Design Decisions
//! - Host matching is case-insensitive
//! - Path matching is case-sensitive and a raw string prefix
//! - No regex in the hot path

use axum::http::{header, HeaderMap, Uri};
use std::fmt;

/// A dispatch table entry owned by exactly one routing unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DispatchKey {
    /// Lower-cased host without port.
    Host(String),
    /// Path key without slashes; matches requests under `/<key>`.
    Path(String),
}

impl DispatchKey {
    /// Sort key used by listings (`listen key` ordering).
    pub fn as_str(&self) -> &str {
        match self {
            DispatchKey::Host(h) => h,
            DispatchKey::Path(p) => p,
        }
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchKey::Host(h) => write!(f, "host:{h}"),
            DispatchKey::Path(p) => write!(f, "path:/{p}"),
        }
    }
}

/// Extract the host part of a listen key or Host header value.
///
/// Accepts `host`, `host:port`, and `scheme://host:port/...`.
pub fn host_of(value: &str) -> String {
    let rest = value.split_once("://").map_or(value, |(_, rest)| rest);
    let authority = rest.split('/').next().unwrap_or_default();
    strip_port(authority).to_lowercase()
}

fn strip_port(authority: &str) -> &str {
    // Bracketed IPv6 literal: keep everything up to the closing bracket.
    if authority.starts_with('[') {
        return authority
            .find(']')
            .map_or(authority, |end| &authority[..=end]);
    }
    authority.split(':').next().unwrap_or_default()
}

/// Explicit port of an authority (`host:port`, `[v6]:port`), if any.
pub fn port_of(authority: &str) -> Option<u16> {
    let after_host = match authority.find(']') {
        Some(end) => &authority[end + 1..],
        None => authority,
    };
    after_host.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
}

/// The request authority (port included): the Host header, else the
/// authority of an absolute request URI (HTTP/2).
pub fn request_authority(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_owned)
        .or_else(|| uri.authority().map(|a| a.as_str().to_owned()))
}

/// Matches the request path prefix `/<key>`.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a matcher for a path key (slashes are normalized).
    pub fn new(key: &str) -> Self {
        Self {
            prefix: format!("/{}", key.trim_matches('/')),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Return the path with the prefix removed, or `None` when it does not match.
    /// The prefix only matches whole segments: `/promo` owns `/promo` and
    /// `/promo/...`, never `/promotions`.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix(self.prefix.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("example.com"), "example.com");
        assert_eq!(host_of("EXAMPLE.com:8080"), "example.com");
        assert_eq!(host_of("http://example.com:80/x"), "example.com");
        assert_eq!(host_of("[::1]:8080"), "[::1]");
        assert_eq!(host_of(""), "");
    }

    #[test]
    fn test_port_of() {
        assert_eq!(port_of("a.test:8080"), Some(8080));
        assert_eq!(port_of("a.test"), None);
        assert_eq!(port_of("[::1]:9000"), Some(9000));
        assert_eq!(port_of("[::1]"), None);
    }

    #[test]
    fn test_request_authority() {
        let mut headers = HeaderMap::new();
        let relative = Uri::from_static("/x");
        assert_eq!(request_authority(&headers, &relative), None);

        let absolute = Uri::from_static("http://b.test/x");
        assert_eq!(request_authority(&headers, &absolute).as_deref(), Some("b.test"));

        headers.insert(header::HOST, HeaderValue::from_static("a.test:8080"));
        assert_eq!(request_authority(&headers, &absolute).as_deref(), Some("a.test:8080"));
    }

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api/");
        assert_eq!(matcher.prefix(), "/api");
        assert_eq!(matcher.strip("/api/v1"), Some("/v1"));
        assert_eq!(matcher.strip("/api"), Some(""));
        assert_eq!(matcher.strip("/images"), None);
    }

    #[test]
    fn test_path_matcher_stops_at_segment_boundary() {
        let matcher = PathPrefixMatcher::new("promo");
        assert_eq!(matcher.strip("/promotions"), None);
        assert_eq!(matcher.strip("/promo/"), Some("/"));
        assert_eq!(matcher.strip("/promo/tions"), Some("/tions"));
    }

    #[test]
    fn test_key_display() {
        assert_eq!(DispatchKey::Host("a.test".into()).to_string(), "host:a.test");
        assert_eq!(DispatchKey::Path("promo".into()).to_string(), "path:/promo");
    }
}

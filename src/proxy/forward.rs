//! Reverse-mode forwarding to a target.
//!
//! # Responsibilities
//! - Build the upstream URI from the target url and the inbound request
//! - Stream the request body up and the response body back
//! - Bound the wait for upstream response headers
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped in both directions
//! - Host rewritten to the target authority
//! - Outbound requests are always HTTP/1.1, whatever the inbound version

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response, StatusCode, Uri, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::error::GatewayError;
use crate::http::response::strip_hop_by_hop;

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid target url {url}: {reason}")]
    InvalidTarget { url: String, reason: String },
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
    #[error("upstream transport error: {0}")]
    Transport(String),
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::InvalidTarget { .. } => "invalid_target",
            ForwardError::Timeout(_) => "timeout",
            ForwardError::Transport(_) => "transport",
        }
    }
}

impl From<ForwardError> for GatewayError {
    fn from(e: ForwardError) -> Self {
        GatewayError::Upstream(e.to_string())
    }
}

/// Shared outbound HTTP client.
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl Upstream {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward `req` to `target`. Headers the caller added are kept.
    pub async fn send(&self, req: Request<Body>, target: &Url) -> Result<Response<Body>, ForwardError> {
        let (mut parts, body) = req.into_parts();

        parts.uri = upstream_uri(target, &parts.uri)?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        match HeaderValue::from_str(&authority_of(target)) {
            Ok(host) => {
                parts.headers.insert(header::HOST, host);
            }
            Err(e) => {
                return Err(ForwardError::InvalidTarget {
                    url: target.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        let outbound = Request::from_parts(parts, body);
        let response = tokio::time::timeout(self.timeout, self.client.request(outbound))
            .await
            .map_err(|_| ForwardError::Timeout(self.timeout))?
            .map_err(|e| ForwardError::Transport(e.to_string()))?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Parse a target url, supplying `default_scheme` when it has none.
pub fn parse_target(raw: &str, default_scheme: &str) -> Result<Url, ForwardError> {
    let raw = raw.trim();
    let parsed = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{default_scheme}://{raw}"))
    };
    parsed.map_err(|e| ForwardError::InvalidTarget {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// `host[:port]`, port only when explicit.
pub fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Target path joined to the request path by exactly one slash; target
/// query first, then the request query.
pub fn upstream_uri(target: &Url, inbound: &Uri) -> Result<Uri, ForwardError> {
    let path = join_paths(target.path(), inbound.path());
    let query = join_queries(target.query(), inbound.query());

    let mut uri = format!("{}://{}{}", target.scheme(), authority_of(target), path);
    if let Some(query) = query {
        uri.push('?');
        uri.push_str(&query);
    }
    uri.parse().map_err(|e: axum::http::uri::InvalidUri| ForwardError::InvalidTarget {
        url: target.to_string(),
        reason: e.to_string(),
    })
}

pub fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) if !path.is_empty() => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

pub fn join_queries(first: Option<&str>, second: Option<&str>) -> Option<String> {
    match (first.filter(|q| !q.is_empty()), second.filter(|q| !q.is_empty())) {
        (Some(a), Some(b)) => Some(format!("{a}&{b}")),
        (Some(q), None) | (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    }
}

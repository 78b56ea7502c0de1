//! Single entry point for every inbound request.
//!
//! # Responsibilities
//! - Map a request to its routing unit: path prefix first, then host
//! - Strip the matched path prefix before delegating
//! - Answer 400 (no host) or 404 (unknown host) itself, marked as a failed
//!   hop so a same-host redirect that lands nowhere is counted as FAILED
//!
//! # Design Decisions
//! - The table lock is held only for the lookup, never while forwarding
//! - Returns a boxed future so a unit can re-enter dispatch for an internal redirect

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures_util::future::BoxFuture;
use std::sync::{Arc, PoisonError};

use crate::http::request::with_path_and_query;
use crate::http::response::error_response;
use crate::proxy::handler::hop_failure;
use crate::proxy::forward::Upstream;
use crate::proxy::instance::ProxyInstance;
use crate::routing::matcher::{host_of, request_authority};
use crate::routing::tables::SharedTables;

#[derive(Clone)]
pub struct Dispatcher {
    tables: SharedTables,
    upstream: Upstream,
}

enum Lookup {
    Found(Arc<ProxyInstance>, Option<String>),
    NoHost,
    Unknown(String),
}

impl Dispatcher {
    pub fn new(tables: SharedTables, upstream: Upstream) -> Self {
        Self { tables, upstream }
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    pub fn dispatch(&self, req: Request<Body>) -> BoxFuture<'static, Response> {
        let this = self.clone();
        Box::pin(async move { this.route(req).await })
    }

    async fn route(self, mut req: Request<Body>) -> Response {
        let (instance, rewritten) = match self.lookup(&req) {
            Lookup::Found(instance, rewritten) => (instance, rewritten),
            Lookup::NoHost => {
                tracing::debug!(path = %req.uri().path(), "Request without host");
                return hop_failure(
                    error_response(StatusCode::BAD_REQUEST, "missing Host header"),
                    "unrouted",
                );
            }
            Lookup::Unknown(host) => {
                tracing::debug!(host = %host, path = %req.uri().path(), "No routing unit matched");
                return hop_failure(
                    error_response(StatusCode::NOT_FOUND, "No matching routing unit"),
                    "unrouted",
                );
            }
        };

        if let Some(path_and_query) = rewritten {
            match with_path_and_query(req.uri(), &path_and_query) {
                Ok(uri) => *req.uri_mut() = uri,
                Err(e) => {
                    tracing::warn!(unit_id = %instance.id(), error = %e, "Cannot strip path prefix");
                    return hop_failure(
                        error_response(StatusCode::BAD_REQUEST, "invalid request path"),
                        "unrouted",
                    );
                }
            }
        }

        instance.handle(req, self).await
    }

    fn lookup(&self, req: &Request<Body>) -> Lookup {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);

        if let Some((instance, rest)) = tables.match_path(req.uri().path()) {
            let path = if rest.starts_with('/') {
                rest.to_string()
            } else {
                format!("/{rest}")
            };
            let path_and_query = match req.uri().query() {
                Some(query) => format!("{path}?{query}"),
                None => path,
            };
            return Lookup::Found(Arc::clone(instance), Some(path_and_query));
        }

        let Some(authority) = request_authority(req.headers(), req.uri()) else {
            return Lookup::NoHost;
        };
        let host = host_of(&authority);
        match tables.match_host(&host) {
            Some(instance) => Lookup::Found(Arc::clone(instance), None),
            None => Lookup::Unknown(host),
        }
    }
}

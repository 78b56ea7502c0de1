//! Per-request state machine of a routing unit.
//!
//! ```text
//! NEW → ATTRIBUTED → TARGET_SELECTED → FORWARDED → COMPLETED | FAILED
//! ```
//!
//! - ATTRIBUTED: RID/RRID/RUID resolved; cookies are set on whatever response
//!   the first pass returns
//! - TARGET_SELECTED: selection failure goes straight to FAILED (500),
//!   counted against the unit id
//! - FORWARDED: reverse mode streams to the target; redirect/path mode
//!   answers 301 for a foreign host, or re-dispatches exactly once for the
//!   same host. The second pass forwards in reverse mode and never
//!   re-attributes or redirects.
//!
//! Stats and metrics are recorded exactly once per client request, by the
//! first pass, when it reaches a terminal state.

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

use crate::config::unit::{ProxyMode, Target};
use crate::error::GatewayError;
use crate::http::request::with_path_and_query;
use crate::http::response::error_response;
use crate::load_balancer::selector::affinity_cookie_name;
use crate::load_balancer::signals::RequestSignals;
use crate::observability::metrics;
use crate::proxy::attribution::Attribution;
use crate::proxy::forward::{join_queries, parse_target, ForwardError, Upstream};
use crate::proxy::instance::{ProxyInstance, RoutingState};
use crate::routing::dispatcher::Dispatcher;
use crate::routing::matcher::{host_of, port_of, request_authority};
use crate::stats::collector::Outcome;

/// Loop-guard marker set on the internal re-dispatch and stripped on entry.
pub const X_INTERNAL_REDIRECT: HeaderName = HeaderName::from_static("x-internal-redirect");

/// Extension carried by the re-dispatched request of a same-host redirect.
#[derive(Debug, Clone)]
struct InternalHop {
    attribution: Attribution,
}

/// Extension on a second-pass response that ended in FAILED, including
/// hops the dispatcher could not route.
#[derive(Debug, Clone, Copy)]
struct HopFailed {
    kind: &'static str,
}

/// Terminal bookkeeping for one client request. Consumed by the terminal
/// transition, so it can only be recorded once.
struct Exchange {
    instance: Arc<ProxyInstance>,
    user_id: String,
    started: Instant,
}

impl Exchange {
    fn complete(self, target_id: &str, response: &Response) {
        self.instance
            .stats()
            .record(target_id, &self.user_id, Outcome::Completed);

        let bytes = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        metrics::record_request(
            self.instance.id(),
            target_id,
            response.status().as_u16(),
            self.started,
            bytes,
        );
    }

    fn fail(self, target_id: &str, status: StatusCode, kind: &'static str) {
        self.instance
            .stats()
            .record(target_id, &self.user_id, Outcome::Failed);
        metrics::record_error(self.instance.id(), target_id, status.as_u16(), kind);
    }
}

impl ProxyInstance {
    /// Run one request through this unit.
    pub(crate) async fn handle(self: Arc<Self>, mut req: Request<Body>, dispatcher: Dispatcher) -> Response {
        req.headers_mut().remove(X_INTERNAL_REDIRECT);
        let hop = req.extensions_mut().remove::<InternalHop>();
        let state = self.snapshot();

        if !state.config.active {
            let response = error_response(StatusCode::SERVICE_UNAVAILABLE, "routing unit disabled");
            return match hop {
                Some(_) => hop_failure(response, "disabled"),
                None => response,
            };
        }

        match hop {
            Some(hop) => self.second_pass(req, &state, &hop.attribution, dispatcher.upstream()).await,
            None => self.first_pass(req, &state, &dispatcher).await,
        }
    }

    async fn first_pass(
        self: &Arc<Self>,
        req: Request<Body>,
        state: &RoutingState,
        dispatcher: &Dispatcher,
    ) -> Response {
        let (attribution, selected) = {
            let signals = RequestSignals::new(req.headers(), req.uri());
            let attribution = Attribution::resolve(self.id(), &signals);
            let selected = self.selector().select(&signals, &state.config).cloned();
            (attribution, selected)
        };
        let exchange = Exchange {
            instance: Arc::clone(self),
            user_id: attribution.user_id(req.headers()),
            started: Instant::now(),
        };

        let target = match selected {
            Ok(target) => target,
            Err(e) => {
                let err = GatewayError::from(e);
                tracing::warn!(unit_id = %self.id(), error = %err, "Target selection failed");
                exchange.fail(self.id(), StatusCode::INTERNAL_SERVER_ERROR, "selection");
                let mut response = error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
                attribution.set_cookies(response.headers_mut(), None);
                return response;
            }
        };

        tracing::debug!(
            unit_id = %self.id(),
            target_id = %target.id,
            mode = state.config.mode.as_str(),
            "Target selected"
        );

        let mut response = match state.config.mode {
            ProxyMode::Reverse => {
                match self.forward(req, &target, &attribution, dispatcher.upstream()).await {
                    Ok(response) => {
                        exchange.complete(&target.id, &response);
                        response
                    }
                    Err(e) => {
                        let (status, kind) = (e.status(), e.kind());
                        let err = GatewayError::from(e);
                        tracing::warn!(unit_id = %self.id(), target_id = %target.id, error = %err, "Forwarding failed");
                        exchange.fail(&target.id, status, kind);
                        error_response(status, "Error forwarding request")
                    }
                }
            }
            ProxyMode::Redirect | ProxyMode::Path => {
                self.redirect(req, &target, &attribution, exchange, dispatcher).await
            }
        };

        let affinity = affinity_cookie_name(self.id());
        attribution.set_cookies(response.headers_mut(), Some((&affinity, &target.url)));
        response
    }

    async fn second_pass(
        &self,
        req: Request<Body>,
        state: &RoutingState,
        attribution: &Attribution,
        upstream: &Upstream,
    ) -> Response {
        let selected = {
            let signals = RequestSignals::new(req.headers(), req.uri());
            self.selector().select(&signals, &state.config).cloned()
        };
        let target = match selected {
            Ok(target) => target,
            Err(e) => {
                let err = GatewayError::from(e);
                tracing::warn!(unit_id = %self.id(), error = %err, "Target selection failed on internal hop");
                let response = error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
                return hop_failure(response, "selection");
            }
        };

        match self.forward(req, &target, attribution, upstream).await {
            Ok(response) => response,
            Err(e) => {
                let (status, kind) = (e.status(), e.kind());
                let err = GatewayError::from(e);
                tracing::warn!(unit_id = %self.id(), target_id = %target.id, error = %err, "Forwarding failed on internal hop");
                hop_failure(error_response(status, "Error forwarding request"), kind)
            }
        }
    }

    async fn forward(
        &self,
        mut req: Request<Body>,
        target: &Target,
        attribution: &Attribution,
        upstream: &Upstream,
    ) -> Result<Response, ForwardError> {
        let url = parse_target(&target.url, "http")?;
        attribution.apply_headers(req.headers_mut(), url.query().unwrap_or_default());
        upstream.send(req, &url).await
    }

    async fn redirect(
        &self,
        mut req: Request<Body>,
        target: &Target,
        attribution: &Attribution,
        exchange: Exchange,
        dispatcher: &Dispatcher,
    ) -> Response {
        let url = match parse_target(&target.url, "https") {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(unit_id = %self.id(), target_id = %target.id, error = %e, "Invalid redirect target");
                exchange.fail(&target.id, e.status(), e.kind());
                return error_response(e.status(), "Invalid target URL");
            }
        };

        let inbound = request_authority(req.headers(), req.uri());
        if !same_authority(&url, inbound.as_deref()) {
            let response = match HeaderValue::from_str(url.as_str()) {
                Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
                Err(_) => error_response(StatusCode::BAD_GATEWAY, "Invalid target URL"),
            };
            tracing::debug!(unit_id = %self.id(), location = %url, "External redirect");
            exchange.complete(&target.id, &response);
            return response;
        }

        let path_and_query = match join_queries(url.query(), req.uri().query()) {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        match with_path_and_query(req.uri(), &path_and_query) {
            Ok(uri) => *req.uri_mut() = uri,
            Err(e) => {
                tracing::warn!(unit_id = %self.id(), error = %e, "Cannot rewrite request for internal redirect");
                exchange.fail(&target.id, StatusCode::BAD_GATEWAY, "invalid_target");
                return error_response(StatusCode::BAD_GATEWAY, "Invalid target URL");
            }
        }
        req.headers_mut()
            .insert(X_INTERNAL_REDIRECT, HeaderValue::from_static("true"));
        req.extensions_mut().insert(InternalHop {
            attribution: attribution.clone(),
        });

        tracing::debug!(unit_id = %self.id(), path = %path_and_query, "Same-host redirect, re-dispatching");
        let response = dispatcher.dispatch(req).await;

        match response.extensions().get::<HopFailed>().copied() {
            Some(failed) => exchange.fail(&target.id, response.status(), failed.kind),
            None => exchange.complete(&target.id, &response),
        }
        response
    }
}

pub(crate) fn hop_failure(mut response: Response, kind: &'static str) -> Response {
    response.extensions_mut().insert(HopFailed { kind });
    response
}

/// Host compared case-insensitively; ports compared after defaulting
/// (inbound listeners are plain HTTP, so an inbound default is 80).
fn same_authority(target: &Url, inbound: Option<&str>) -> bool {
    let Some(inbound) = inbound else {
        return false;
    };
    let target_host = target.host_str().unwrap_or_default().to_lowercase();
    host_of(inbound) == target_host
        && port_of(inbound).unwrap_or(80) == target.port_or_known_default().unwrap_or(80)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        parse_target(raw, "https").unwrap()
    }

    #[test]
    fn test_failures_map_into_gateway_errors() {
        let err = GatewayError::from(ForwardError::Transport("connection refused".into()));
        assert!(matches!(err, GatewayError::Upstream(ref m) if m.contains("connection refused")));

        let err = GatewayError::from(crate::error::SelectionError::NoActiveTargets);
        assert_eq!(err.to_string(), "target selection failed: no active targets");
    }

    #[test]
    fn test_same_authority() {
        assert!(same_authority(&url("http://A.test/x"), Some("a.test")));
        assert!(same_authority(&url("http://a.test:80/x"), Some("a.test")));
        assert!(same_authority(&url("http://a.test:8080/"), Some("a.test:8080")));
        assert!(!same_authority(&url("http://a.test:8080/"), Some("a.test")));
        assert!(!same_authority(&url("a.test/x"), Some("a.test")));
        assert!(!same_authority(&url("http://b.test/"), Some("a.test")));
        assert!(!same_authority(&url("http://a.test/"), None));
    }
}

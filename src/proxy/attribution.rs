//! Attribution triple and the cookies/headers that carry it.
//!
//! - RID: fixed per routing unit (`rid_<unitId>`)
//! - RRID: fresh per request
//! - RUID: stable per user, read from the `ruid` cookie or minted

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use cookie::time::Duration;
use cookie::Cookie;
use uuid::Uuid;

use crate::load_balancer::signals::RequestSignals;

pub const RID_COOKIE: &str = "rid";
pub const RRID_COOKIE: &str = "rrid";
pub const RUID_COOKIE: &str = "ruid";

pub const X_REDIRECT_ID: HeaderName = HeaderName::from_static("x-redirect-id");
pub const X_REDIRECT_REQUEST_ID: HeaderName = HeaderName::from_static("x-redirect-request-id");
pub const X_REDIRECT_USER_ID: HeaderName = HeaderName::from_static("x-redirect-user-id");
pub const X_REDIRECT_QUERY_PARAMS: HeaderName = HeaderName::from_static("x-redirect-query-params");
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

const ONE_DAY: Duration = Duration::hours(24);
const THIRTY_DAYS: Duration = Duration::days(30);
const ONE_YEAR: Duration = Duration::days(365);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub rid: String,
    pub rrid: String,
    pub ruid: String,
}

impl Attribution {
    pub fn resolve(unit_id: &str, signals: &RequestSignals<'_>) -> Self {
        let ruid = signals
            .cookie(RUID_COOKIE)
            .filter(|v| !v.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

        Self {
            rid: format!("rid_{unit_id}"),
            rrid: Uuid::new_v4().to_string(),
            ruid,
        }
    }

    /// User id recorded in stats: `X-User-ID` when present, else the RUID.
    pub fn user_id(&self, headers: &HeaderMap) -> String {
        headers
            .get(X_USER_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| self.ruid.clone(), str::to_owned)
    }

    /// Append the identity cookies, plus the affinity cookie `(name, target url)`
    /// when a target was selected.
    pub fn set_cookies(&self, headers: &mut HeaderMap, affinity: Option<(&str, &str)>) {
        if let Some((name, url)) = affinity {
            append_cookie(headers, name, url, ONE_DAY);
        }
        append_cookie(headers, RRID_COOKIE, &self.rrid, ONE_DAY);
        append_cookie(headers, RID_COOKIE, &self.rid, THIRTY_DAYS);
        append_cookie(headers, RUID_COOKIE, &self.ruid, ONE_YEAR);
    }

    /// Headers injected on reverse-mode forwarded requests.
    pub fn apply_headers(&self, headers: &mut HeaderMap, target_query: &str) {
        let pairs = [
            (X_REDIRECT_ID, self.rid.as_str()),
            (X_REDIRECT_REQUEST_ID, self.rrid.as_str()),
            (X_REDIRECT_USER_ID, self.ruid.as_str()),
            (X_REDIRECT_QUERY_PARAMS, target_query),
        ];
        for (name, value) in pairs {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(_) => {
                    headers.remove(name);
                }
            }
        }
    }
}

fn append_cookie(headers: &mut HeaderMap, name: &str, value: &str, max_age: Duration) {
    let cookie = Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .max_age(max_age)
        .build();
    match HeaderValue::from_str(&cookie.encoded().to_string()) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(cookie = %name, error = %e, "Skipping unencodable cookie"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::signals::parse_cookies;
    use axum::http::Uri;

    fn set_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| Cookie::parse_encoded(v.to_str().unwrap().to_string()).unwrap())
            .collect()
    }

    #[test]
    fn test_resolve_mints_and_reuses_ruid() {
        let uri = Uri::from_static("/");
        let empty = HeaderMap::new();
        let minted = Attribution::resolve("u1", &RequestSignals::new(&empty, &uri));
        assert_eq!(minted.rid, "rid_u1");
        assert!(Uuid::parse_str(&minted.ruid).is_ok());

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("ruid=known-user"));
        let known = Attribution::resolve("u1", &RequestSignals::new(&headers, &uri));
        assert_eq!(known.ruid, "known-user");
        assert_ne!(known.rrid, minted.rrid);
    }

    #[test]
    fn test_user_id_prefers_header() {
        let attribution = Attribution {
            rid: "rid_u1".into(),
            rrid: "r".into(),
            ruid: "cookie-user".into(),
        };
        let mut headers = HeaderMap::new();
        assert_eq!(attribution.user_id(&headers), "cookie-user");
        headers.insert(X_USER_ID, HeaderValue::from_static("account-7"));
        assert_eq!(attribution.user_id(&headers), "account-7");
    }

    #[test]
    fn test_cookie_attributes() {
        let attribution = Attribution {
            rid: "rid_u1".into(),
            rrid: "r-1".into(),
            ruid: "user-1".into(),
        };
        let mut headers = HeaderMap::new();
        attribution.set_cookies(&mut headers, Some(("proxy_u1", "http://a.internal/x?y=1;z")));

        let cookies = set_cookies(&headers);
        let expected = [
            ("proxy_u1", "http://a.internal/x?y=1;z", ONE_DAY),
            ("rrid", "r-1", ONE_DAY),
            ("rid", "rid_u1", THIRTY_DAYS),
            ("ruid", "user-1", ONE_YEAR),
        ];
        assert_eq!(cookies.len(), expected.len());
        for (cookie, (name, value, age)) in cookies.iter().zip(expected) {
            assert_eq!(cookie.name(), name);
            assert_eq!(cookie.value(), value);
            assert_eq!(cookie.max_age(), Some(age));
            assert_eq!(cookie.path(), Some("/"));
            assert_eq!(cookie.http_only(), Some(true));
        }
    }

    #[test]
    fn test_affinity_cookie_round_trips_through_request() {
        let attribution = Attribution {
            rid: "rid_u1".into(),
            rrid: "r".into(),
            ruid: "u".into(),
        };
        let mut response = HeaderMap::new();
        attribution.set_cookies(&mut response, Some(("proxy_u1", "http://a.internal/?x=1;y")));

        let pair = response.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        let pair = pair.split(';').next().unwrap().to_string();
        let mut request = HeaderMap::new();
        request.insert(header::COOKIE, HeaderValue::from_str(&pair).unwrap());
        assert_eq!(parse_cookies(&request)["proxy_u1"], "http://a.internal/?x=1;y");
    }

    #[test]
    fn test_forwarding_headers() {
        let attribution = Attribution {
            rid: "rid_u1".into(),
            rrid: "r".into(),
            ruid: "u".into(),
        };
        let mut headers = HeaderMap::new();
        attribution.apply_headers(&mut headers, "campaign=spring");
        assert_eq!(headers[X_REDIRECT_ID], "rid_u1");
        assert_eq!(headers[X_REDIRECT_REQUEST_ID], "r");
        assert_eq!(headers[X_REDIRECT_USER_ID], "u");
        assert_eq!(headers[X_REDIRECT_QUERY_PARAMS], "campaign=spring");
    }
}

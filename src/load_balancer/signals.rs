//! Request signals consumed by target selection.
//!
//! # Responsibilities
//! - Expose headers, cookies and query parameters of one request
//! - Derive user-agent platform/browser and preferred language
//!
//! # Design Decisions
//! - Cookies and query are parsed once per request; the first occurrence wins
//! - User-agent heuristics are fixed keyword tables, matched case-insensitively

use axum::http::{header, HeaderMap, Uri};
use cookie::Cookie;
use std::collections::HashMap;

const MOBILE_KEYWORDS: &[&str] = &[
    "mobile",
    "android",
    "iphone",
    "ipad",
    "ipod",
    "windows phone",
    "blackberry",
    "opera mini",
];

// Order matters: Edge and Opera user agents also contain "chrome" and
// "safari", Chrome's contains "safari".
const BROWSERS: &[(&str, &str)] = &[
    ("edge", "edge"),
    ("edg/", "edge"),
    ("opera", "opera"),
    ("opr/", "opera"),
    ("firefox", "firefox"),
    ("chrome", "chrome"),
    ("safari", "safari"),
    ("msie", "ie"),
    ("trident/7", "ie"),
];

/// Signals of one inbound request.
#[derive(Debug)]
pub struct RequestSignals<'a> {
    headers: &'a HeaderMap,
    cookies: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl<'a> RequestSignals<'a> {
    pub fn new(headers: &'a HeaderMap, uri: &Uri) -> Self {
        Self {
            headers,
            cookies: parse_cookies(headers),
            query: parse_query(uri.query().unwrap_or_default()),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn user_agent(&self) -> &str {
        self.header(header::USER_AGENT.as_str()).unwrap_or_default()
    }

    pub fn accept_language(&self) -> &str {
        self.header(header::ACCEPT_LANGUAGE.as_str()).unwrap_or_default()
    }
}

/// Parse every `Cookie` header; the first cookie of a given name wins.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        for cookie in Cookie::split_parse_encoded(raw).flatten() {
            cookies
                .entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }
    }
    cookies
}

fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut query = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        query.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    query
}

/// `mobile` when the user agent contains a mobile keyword, else `desktop`.
pub fn detect_platform(user_agent: &str) -> &'static str {
    let ua = user_agent.to_lowercase();
    if MOBILE_KEYWORDS.iter().any(|k| ua.contains(k)) {
        "mobile"
    } else {
        "desktop"
    }
}

/// Browser name of the first matching keyword, else `other`.
pub fn detect_browser(user_agent: &str) -> &'static str {
    let ua = user_agent.to_lowercase();
    BROWSERS
        .iter()
        .find(|(keyword, _)| ua.contains(keyword))
        .map_or("other", |(_, name)| name)
}

/// First Accept-Language entry, quality suffix stripped, lower-cased.
pub fn preferred_language(accept_language: &str) -> String {
    accept_language
        .split(',')
        .next()
        .and_then(|first| first.split(';').next())
        .map(|lang| lang.trim().to_lowercase())
        .unwrap_or_default()
}

//! Outgoing request construction.
//!
//! # Responsibilities
//! - Join operation paths onto the service base URL
//! - Stamp every request with a fresh request ID, the client user agent and
//!   the JSON content type
//! - Forward the service bearer credential

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use url::Url;
use uuid::Uuid;

/// Header carrying the per-attempt request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// User agent sent on service calls.
pub const CLIENT_USER_AGENT: &str = concat!("upstream-client/", env!("CARGO_PKG_VERSION"));

/// User agent sent on health probes.
pub const PROBE_USER_AGENT: &str = concat!("upstream-client-health-check/", env!("CARGO_PKG_VERSION"));

/// Append `path` to `base`, keeping any path prefix `base` already carries.
///
/// `http://docs:8000/v2` + `/documents` → `http://docs:8000/v2/documents`.
pub fn build_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut joined = base.as_str().trim_end_matches('/').to_string();
    if !path.is_empty() {
        if !path.starts_with('/') {
            joined.push('/');
        }
        joined.push_str(path);
    }
    Url::parse(&joined)
}

/// Generate a request ID.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Default headers for one attempt.
pub fn base_headers(request_id: &str, user_agent: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(X_REQUEST_ID, value);
    }
    headers
}

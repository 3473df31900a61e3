//! Request inspection.
//!
//! # Responsibilities
//! - Derive the source identity of a request
//! - Build the `RequestView` the gate evaluates
//!
//! # Design Decisions
//! - `X-Forwarded-For` is only honoured when configured; the first entry is
//!   the original client
//! - Headers that are not valid UTF-8 are ignored, not rejected

use axum::body::Bytes;
use axum::http::{request::Parts, HeaderMap};
use std::net::SocketAddr;

use crate::security::RequestView;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Source used when neither a forwarded address nor a peer address is known.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Source identity: first `X-Forwarded-For` entry (when trusted), else the
/// peer IP, else `"unknown"`.
pub fn client_source(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(first) = forwarded {
            return first.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: axum::http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Build the gate's view of a buffered request.
pub fn request_view(parts: &Parts, source: String, body: Bytes) -> RequestView {
    let mut view = RequestView::new(source, parts.method.as_str(), parts.uri.path());
    if let Some(query) = parts.uri.query() {
        view = view.with_query(query);
    }
    if let Some(ua) = header_str(&parts.headers, axum::http::header::USER_AGENT) {
        view = view.with_user_agent(ua);
    }
    if let Some(referer) = header_str(&parts.headers, axum::http::header::REFERER) {
        view = view.with_referer(referer);
    }
    if !body.is_empty() {
        view = view.with_body(body);
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn peer() -> Option<SocketAddr> {
        Some("10.1.2.3:55000".parse().unwrap())
    }

    #[test]
    fn test_first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        assert_eq!(client_source(&headers, peer(), true), "203.0.113.7");
    }

    #[test]
    fn test_forwarded_ignored_when_untrusted() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_source(&headers, peer(), false), "10.1.2.3");
    }

    #[test]
    fn test_fallbacks() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" , 1.1.1.1"));
        assert_eq!(client_source(&headers, peer(), true), "10.1.2.3");
        assert_eq!(client_source(&HeaderMap::new(), None, true), UNKNOWN_SOURCE);
    }

    #[test]
    fn test_request_view_fields() {
        let request = Request::builder()
            .method("POST")
            .uri("/login?next=%2Fhome")
            .header("user-agent", "Mozilla/5.0")
            .header("referer", "https://example.com/")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();

        let view = request_view(&parts, "1.2.3.4".into(), Bytes::from_static(b"user=bob"));
        assert_eq!(view.source, "1.2.3.4");
        assert_eq!(view.method, "POST");
        assert_eq!(view.path, "/login");
        assert_eq!(view.query.as_deref(), Some("next=%2Fhome"));
        assert_eq!(view.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(view.referer.as_deref(), Some("https://example.com/"));
        assert_eq!(view.body_text(), "user=bob");
    }

    #[test]
    fn test_request_view_without_optional_parts() {
        let (parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let view = request_view(&parts, "unknown".into(), Bytes::new());
        assert!(view.query.is_none());
        assert!(view.user_agent.is_none());
        assert!(view.body.is_none());
    }
}

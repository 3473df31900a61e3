//! Gate enforcement for every inbound request.
//!
//! Denied requests are answered here and never reach the upstream.
//! Admitted requests carry their `Verdict` in the request extensions.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::CONTENT_LENGTH, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::http::request::{client_source, request_view};
use crate::http::response::{deny_response, payload_too_large};
use crate::http::server::AppState;

pub async fn shield_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = state.config.load();
    let max_body = config.security.max_body_size;

    // ConnectInfo is absent when the router is driven without a socket.
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let source = client_source(request.headers(), peer, config.source.trust_forwarded_for);

    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_body) {
        tracing::warn!(source = %source, limit = max_body, "Request body over limit");
        return payload_too_large(max_body);
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, max_body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(source = %source, limit = max_body, error = %e, "Failed to buffer request body");
            return payload_too_large(max_body);
        }
    };

    let view = request_view(&parts, source, bytes.clone());
    let verdict = state.shield.evaluate(&view);

    if !verdict.allowed {
        tracing::warn!(
            source = %view.source,
            method = %view.method,
            path = %view.path,
            outcome = verdict.outcome.as_str(),
            reason = %verdict.reason,
            "Request denied"
        );
        return deny_response(&verdict);
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(verdict);
    next.run(request).await
}

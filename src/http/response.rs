//! Responses produced by the shield itself.
//!
//! # Responsibilities
//! - Map a denied verdict to 403 / 429 with a JSON `{error, message, reason}` body,
//!   plus `blockedUntil` when the source is blocked
//! - Body-limit and upstream failures
//! - The built-in responder used when no upstream is configured
//!
//! # Design Decisions
//! - `reason` comes from the verdict, which names categories but never a
//!   pattern, so detection rules are not leaked to the client

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::security::{Outcome, Verdict};

/// JSON body of every shield-generated error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
    pub reason: String,
    #[serde(rename = "blockedUntil", skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<u64>,
}

fn error_response(status: StatusCode, error: &'static str, message: &'static str, reason: String) -> Response {
    error_body(status, ErrorBody { error, message, reason, blocked_until: None })
}

fn error_body(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}

/// Status for a denied verdict.
pub fn deny_status(outcome: Outcome) -> StatusCode {
    match outcome {
        Outcome::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::FORBIDDEN,
    }
}

/// Response for a denied verdict.
pub fn deny_response(verdict: &Verdict) -> Response {
    let (error, message) = match verdict.outcome {
        Outcome::Blocked => (
            "Access Forbidden",
            "Your address has been blocked due to suspicious activity",
        ),
        Outcome::RateLimited => ("Too Many Requests", "Slow down and retry later"),
        Outcome::Threat => (
            "Security Threat Detected",
            "Malicious activity detected and blocked",
        ),
        Outcome::ProcessingError | Outcome::Admitted => {
            ("Request Rejected", "The request could not be verified")
        }
    };
    error_body(
        deny_status(verdict.outcome),
        ErrorBody {
            error,
            message,
            reason: verdict.reason.clone(),
            blocked_until: verdict.blocked_until,
        },
    )
}

pub fn payload_too_large(limit: usize) -> Response {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        "Payload Too Large",
        "Request body exceeds the configured limit",
        format!("body larger than {} bytes", limit),
    )
}

pub fn bad_gateway() -> Response {
    error_response(
        StatusCode::BAD_GATEWAY,
        "Bad Gateway",
        "Upstream request failed",
        "upstream unavailable".to_string(),
    )
}

#[derive(Debug, Serialize)]
pub struct ProtectedBody {
    pub success: bool,
    pub message: &'static str,
    pub status: &'static str,
}

/// Answer for admitted requests when no upstream is configured.
pub fn protected() -> Response {
    Json(ProtectedBody {
        success: true,
        message: "Security shield active",
        status: "protected",
    })
    .into_response()
}

//! Google API plumbing shared by the Sheets and Gmail adapters.

pub mod auth;

use serde_json::Value;

pub use auth::{AccessTokenSource, GoogleTokenProvider, TokenGrant};

/// Structured error details from a Google API error body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorDetail {
    /// Human-readable message, when the body carried one.
    pub message: Option<String>,
    /// Machine reason (`rateLimitExceeded`, `RESOURCE_EXHAUSTED`, `invalid_grant`, ...).
    pub reason: Option<String>,
}

/// Parse a Google error body.
///
/// Handles both the REST shape `{"error": {"message", "status", "errors": [{"reason"}]}}`
/// and the OAuth shape `{"error": "invalid_grant", "error_description": "..."}`.
pub fn parse_error_body(body: &str) -> ApiErrorDetail {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return ApiErrorDetail::default();
    };

    match json.get("error") {
        Some(Value::String(code)) => ApiErrorDetail {
            message: json
                .get("error_description")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .or_else(|| Some(code.clone())),
            reason: Some(code.clone()),
        },
        Some(err @ Value::Object(_)) => ApiErrorDetail {
            message: err
                .get("message")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from),
            reason: err
                .pointer("/errors/0/reason")
                .or_else(|| err.get("status"))
                .and_then(Value::as_str)
                .map(String::from),
        },
        _ => ApiErrorDetail::default(),
    }
}

/// Best message for a failed response: structured field first, raw body second.
pub fn error_message(status: u16, body: &str) -> String {
    parse_error_body(body).message.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            format!("HTTP {status}")
        } else {
            trimmed.to_string()
        }
    })
}

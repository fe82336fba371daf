//! Gmail transport: REST `messages.send` and `drafts.create`.
//!
//! Messages are built with lettre's message builder, serialized as
//! RFC 5322 and handed to Gmail base64url-encoded in the `raw` field.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use lettre::Message;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use serde::Deserialize;
use serde_json::json;

use crate::error::MailError;
use crate::google::{AccessTokenSource, error_message, parse_error_body};
use crate::mailer::{MailTransport, OutgoingEmail};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Error reasons Google uses for rate and quota limits.
const QUOTA_REASONS: &[&str] = &[
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
    "quotaExceeded",
    "RESOURCE_EXHAUSTED",
];

#[derive(Debug, Deserialize)]
struct IdResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Gmail REST transport acting as the authenticated user (`me`).
pub struct GmailTransport {
    client: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    from: String,
    base_url: String,
}

impl GmailTransport {
    pub fn new(
        client: reqwest::Client,
        tokens: Arc<dyn AccessTokenSource>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            client,
            tokens,
            from: from.into(),
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    /// Point at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post(&self, path: &str, payload: serde_json::Value) -> Result<Option<String>, MailError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let parsed: IdResponse = resp.json().await?;
        Ok(parsed.id.filter(|id| !id.is_empty()))
    }
}

#[async_trait]
impl MailTransport for GmailTransport {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<Option<String>, MailError> {
        let raw = build_raw_message(&self.from, email)?;
        self.post("messages/send", json!({ "raw": raw })).await
    }

    async fn create_draft(&self, email: &OutgoingEmail) -> Result<Option<String>, MailError> {
        let raw = build_raw_message(&self.from, email)?;
        self.post("drafts", json!({ "message": { "raw": raw } })).await
    }
}

/// Build a plain-text UTF-8 message and encode it for the `raw` field.
pub fn build_raw_message(from: &str, email: &OutgoingEmail) -> Result<String, MailError> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| MailError::InvalidMessage(format!("Invalid from address: {e}")))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| MailError::InvalidMessage(format!("Invalid to address: {e}")))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|e| MailError::InvalidMessage(format!("Failed to build email: {e}")))?;

    Ok(URL_SAFE_NO_PAD.encode(message.formatted()))
}

/// Map a failed Gmail response to a [`MailError`].
pub fn classify_error(status: u16, body: &str) -> MailError {
    let detail = parse_error_body(body);
    let message = error_message(status, body);
    let is_quota = detail
        .reason
        .as_deref()
        .is_some_and(|r| QUOTA_REASONS.contains(&r));

    match status {
        429 => MailError::Quota(message),
        403 if is_quota => MailError::Quota(message),
        401 | 403 => MailError::Auth(message),
        400 => MailError::InvalidMessage(message),
        _ => MailError::Provider { status, message },
    }
}

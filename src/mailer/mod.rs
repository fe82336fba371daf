//! Outbound mail: transport trait and delivery classification.
//!
//! Transports are pure I/O: they either send a message or save it as a
//! draft and hand back the provider's id. Deciding which of the two to do,
//! and tagging the outcome, happens in [`dispatch`].

pub mod gmail;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MailError;

pub use gmail::GmailTransport;

/// A rendered message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// What happened to a dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Drafted,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Drafted => "drafted",
        }
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome tag plus the provider-assigned id (may be empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub outcome: DeliveryOutcome,
    pub provider_id: String,
}

/// Trait for mail transports.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Transport name (e.g. "gmail").
    fn name(&self) -> &str;

    /// Send immediately. Returns the provider message id, if any.
    async fn send(&self, email: &OutgoingEmail) -> Result<Option<String>, MailError>;

    /// Save as a draft. Returns the provider draft id, if any.
    async fn create_draft(&self, email: &OutgoingEmail) -> Result<Option<String>, MailError>;
}

/// Draft or send depending on `dry_run`, and classify the outcome.
///
/// Transport errors are returned untouched.
pub async fn dispatch(
    transport: &dyn MailTransport,
    email: &OutgoingEmail,
    dry_run: bool,
) -> Result<DeliveryResult, MailError> {
    let (outcome, id) = if dry_run {
        (DeliveryOutcome::Drafted, transport.create_draft(email).await?)
    } else {
        (DeliveryOutcome::Sent, transport.send(email).await?)
    };

    let provider_id = id.unwrap_or_default();
    info!(
        transport = transport.name(),
        to = %email.to,
        outcome = outcome.as_str(),
        provider_id = %provider_id,
        "Message dispatched"
    );

    Ok(DeliveryResult {
        outcome,
        provider_id,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Records which call was made.
    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<&'static str>>,
        id: Option<String>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, _email: &OutgoingEmail) -> Result<Option<String>, MailError> {
            self.calls.lock().unwrap().push("send");
            if self.fail {
                return Err(MailError::Quota("Daily sending quota exceeded".into()));
            }
            Ok(self.id.clone())
        }

        async fn create_draft(&self, _email: &OutgoingEmail) -> Result<Option<String>, MailError> {
            self.calls.lock().unwrap().push("draft");
            if self.fail {
                return Err(MailError::Auth("invalid_grant".into()));
            }
            Ok(self.id.clone())
        }
    }

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "a@b.com".into(),
            subject: "Quick follow-up".into(),
            body: "Hi".into(),
        }
    }

    #[tokio::test]
    async fn dry_run_creates_draft() {
        let transport = RecordingTransport {
            id: Some("r-123".into()),
            ..Default::default()
        };
        let result = dispatch(&transport, &email(), true).await.unwrap();
        assert_eq!(result.outcome, DeliveryOutcome::Drafted);
        assert_eq!(result.provider_id, "r-123");
        assert_eq!(*transport.calls.lock().unwrap(), vec!["draft"]);
    }

    #[tokio::test]
    async fn live_run_sends() {
        let transport = RecordingTransport {
            id: Some("m-9".into()),
            ..Default::default()
        };
        let result = dispatch(&transport, &email(), false).await.unwrap();
        assert_eq!(result.outcome, DeliveryOutcome::Sent);
        assert_eq!(result.provider_id, "m-9");
        assert_eq!(*transport.calls.lock().unwrap(), vec!["send"]);
    }

    #[tokio::test]
    async fn missing_id_becomes_empty_string() {
        let transport = RecordingTransport::default();
        let result = dispatch(&transport, &email(), false).await.unwrap();
        assert_eq!(result.provider_id, "");
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        let err = dispatch(&transport, &email(), false).await.unwrap_err();
        assert!(matches!(err, MailError::Quota(_)));
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(DeliveryOutcome::Sent.to_string(), "sent");
        assert_eq!(DeliveryOutcome::Drafted.to_string(), "drafted");
    }
}

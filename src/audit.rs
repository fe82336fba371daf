//! Audit trail: one appended log row per attempted row.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::error::StoreError;
use crate::mailer::DeliveryOutcome;
use crate::store::RowStore;

/// Outcome column of the audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Delivered(DeliveryOutcome),
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered(outcome) => outcome.as_str(),
            Self::Failed => "failed",
        }
    }
}

/// One processed row, as written to the log tab.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub row_number: u64,
    pub recipient: String,
    pub subject: String,
    pub template_key: String,
    pub outcome: AuditOutcome,
    pub provider_id: Option<String>,
    pub error: Option<String>,
}

impl AuditEntry {
    /// Record the provider id; an empty id stays unset.
    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.provider_id = (!id.is_empty()).then_some(id);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Positional layout:
    /// `[timestamp, row_number, recipient, subject, template_key, outcome, provider_id, error]`.
    pub fn to_values(&self) -> Vec<Value> {
        vec![
            json!(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
            json!(self.row_number),
            json!(self.recipient),
            json!(self.subject),
            json!(self.template_key),
            json!(self.outcome.as_str()),
            json!(self.provider_id.as_deref().unwrap_or_default()),
            json!(self.error.as_deref().unwrap_or_default()),
        ]
    }
}

/// Append-only writer bound to a log tab.
pub struct AuditLog {
    store: Arc<dyn RowStore>,
    sheet_id: String,
    tab: String,
}

impl AuditLog {
    pub fn new(store: Arc<dyn RowStore>, sheet_id: impl Into<String>, tab: impl Into<String>) -> Self {
        Self {
            store,
            sheet_id: sheet_id.into(),
            tab: tab.into(),
        }
    }

    pub async fn append(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        self.store
            .append_row(&self.sheet_id, &self.tab, entry.to_values())
            .await
    }
}

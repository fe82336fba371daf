//! Follow-up job driver.
//!
//! Rows are handled one at a time, in source order:
//! 1. normalize, pick a recipient, check the gate (any miss is a skip)
//! 2. derive template key, names and subject
//! 3. resolve and render the template, then draft or send
//! 4. append an audit row and update the summary
//!
//! A failure in step 3 is recorded against that row only; the run goes on.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditLog, AuditOutcome};
use crate::config::JobConfig;
use crate::error::{DispatchError, Result};
use crate::mailer::{DeliveryResult, MailTransport, OutgoingEmail, dispatch};
use crate::pipeline::gate::{GateDecision, evaluate_gate};
use crate::pipeline::recipient::{Recipient, pick_recipient};
use crate::pipeline::row::{RawRow, Row, raw_row_number};
use crate::pipeline::summary::{RunSummary, SkipReason};
use crate::store::RowStore;
use crate::template::{
    DEFAULT_TEMPLATE_KEY, TemplateResolver, TemplateVars, normalize_template_key, render_template,
};

const FIRST_NAME_KEYS: &[&str] = &["first_name", "firstname", "first", "contact_first_name"];
const LAST_NAME_KEYS: &[&str] = &["last_name", "lastname", "last", "contact_last_name"];
const TEMPLATE_KEYS: &[&str] = &["template_key", "template"];

const DEFAULT_SUBJECT: &str = "Quick follow-up";

/// Everything needed to render and dispatch one eligible row.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUp {
    pub row_number: u64,
    pub recipient: String,
    /// Normalized template key.
    pub template_key: String,
    pub subject: String,
    pub vars: TemplateVars,
}

impl FollowUp {
    /// Derive template key, subject and render variables from a row.
    pub fn from_row(row: &Row, recipient: &Recipient) -> Self {
        let first_name = row.first_text(FIRST_NAME_KEYS).unwrap_or_default();
        let last_name = row.first_text(LAST_NAME_KEYS).unwrap_or_default();

        let template_key = normalize_template_key(
            row.first_text(TEMPLATE_KEYS).unwrap_or(DEFAULT_TEMPLATE_KEY),
        );

        let subject = match row.text("subject") {
            Some(subject) => subject.to_string(),
            None if first_name.is_empty() => DEFAULT_SUBJECT.to_string(),
            None => format!("{DEFAULT_SUBJECT}, {first_name}"),
        };

        let mut vars: TemplateVars = row
            .string_fields()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        vars.insert("first_name".into(), first_name.to_string());
        vars.insert("last_name".into(), last_name.to_string());
        vars.insert(
            "status".into(),
            row.text("status").unwrap_or_default().to_string(),
        );
        vars.insert("email".into(), recipient.address.clone());

        Self {
            row_number: row.row_number(),
            recipient: recipient.address.clone(),
            template_key,
            subject,
            vars,
        }
    }
}

/// One pass over the follow-up tab.
pub struct FollowUpJob {
    config: JobConfig,
    store: Arc<dyn RowStore>,
    transport: Arc<dyn MailTransport>,
    templates: TemplateResolver,
    audit: AuditLog,
}

impl FollowUpJob {
    /// The audit log is written to `config.email_log_tab` of the same store.
    pub fn new(
        config: JobConfig,
        store: Arc<dyn RowStore>,
        transport: Arc<dyn MailTransport>,
        templates: TemplateResolver,
    ) -> Self {
        let audit = AuditLog::new(
            Arc::clone(&store),
            config.sheet_id.clone(),
            config.email_log_tab.clone(),
        );
        Self {
            config,
            store,
            transport,
            templates,
            audit,
        }
    }

    /// Process every row once and return the summary.
    ///
    /// Only failing to read the rows is an error; everything per-row is
    /// absorbed into the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let rows = self
            .store
            .read_rows(&self.config.sheet_id, &self.config.follow_up_tab)
            .await?;

        info!(
            tab = %self.config.follow_up_tab,
            rows = rows.len(),
            dry_run = self.config.dry_run,
            "Starting follow-up run"
        );

        let mut summary = RunSummary::new(rows.len() as u64);
        for raw in &rows {
            self.process_row(raw, &mut summary).await;
        }
        Ok(summary)
    }

    async fn process_row(&self, raw: &RawRow, summary: &mut RunSummary) {
        let row = match Row::normalize(raw) {
            Ok(row) => row,
            Err(e) => {
                let row_number = raw_row_number(raw);
                debug!(row = ?row_number, error = ?e, "Skipping malformed row");
                summary.record_skip(SkipReason::InvalidRowShape, row_number);
                return;
            }
        };
        let row_number = row.row_number();

        let Some(recipient) = pick_recipient(&row) else {
            debug!(row = row_number, reason = %SkipReason::MissingRecipientEmail, "Skipping row");
            summary.record_skip(SkipReason::MissingRecipientEmail, Some(row_number));
            return;
        };

        if let GateDecision::NotApproved { value } = evaluate_gate(&row) {
            debug!(
                row = row_number,
                reason = %SkipReason::GateNotApproved,
                gate = %value,
                "Skipping row"
            );
            summary.record_skip(SkipReason::GateNotApproved, Some(row_number));
            return;
        }

        summary.record_attempt();
        let follow_up = FollowUp::from_row(&row, &recipient);

        let entry = match self.deliver(&follow_up).await {
            Ok(result) => {
                summary.record_delivery(result.outcome);
                self.audit_entry(&follow_up, AuditOutcome::Delivered(result.outcome))
                    .with_provider_id(result.provider_id)
            }
            Err(e) => {
                let message = e.failure_message();
                warn!(
                    row = row_number,
                    recipient = %follow_up.recipient,
                    template = %follow_up.template_key,
                    error = %message,
                    "Follow-up failed"
                );
                summary.record_failure(row_number, message.clone());
                self.audit_entry(&follow_up, AuditOutcome::Failed)
                    .with_error(message)
            }
        };

        if let Err(e) = self.audit.append(&entry).await {
            warn!(row = row_number, error = %e, "Failed to append audit row");
        }
    }

    async fn deliver(&self, follow_up: &FollowUp) -> std::result::Result<DeliveryResult, DispatchError> {
        let template = self.templates.resolve(&follow_up.template_key).await?;
        let email = OutgoingEmail {
            to: follow_up.recipient.clone(),
            subject: follow_up.subject.clone(),
            body: render_template(&template, &follow_up.vars),
        };
        Ok(dispatch(self.transport.as_ref(), &email, self.config.dry_run).await?)
    }

    fn audit_entry(&self, follow_up: &FollowUp, outcome: AuditOutcome) -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now(),
            row_number: follow_up.row_number,
            recipient: follow_up.recipient.clone(),
            subject: follow_up.subject.clone(),
            template_key: follow_up.template_key.clone(),
            outcome,
            provider_id: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn row(value: Value) -> Row {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        Row::normalize(&map).unwrap()
    }

    fn follow_up(value: Value) -> FollowUp {
        let row = row(value);
        let recipient = pick_recipient(&row).unwrap();
        FollowUp::from_row(&row, &recipient)
    }

    #[test]
    fn subject_uses_first_name() {
        let f = follow_up(json!({"row_number": 2, "email": "a@b.com", "first_name": "Ann"}));
        assert_eq!(f.subject, "Quick follow-up, Ann");
        assert_eq!(f.template_key, "follow_up");
    }

    #[test]
    fn subject_without_name() {
        let f = follow_up(json!({"row_number": 2, "email": "a@b.com"}));
        assert_eq!(f.subject, "Quick follow-up");
    }

    #[test]
    fn explicit_subject_wins() {
        let f = follow_up(json!({
            "row_number": 2,
            "email": "a@b.com",
            "first_name": "Ann",
            "subject": "Your quote",
        }));
        assert_eq!(f.subject, "Your quote");
    }

    #[test]
    fn name_aliases_and_template_key() {
        let f = follow_up(json!({
            "row_number": 9,
            "lead_email": "z@q.org",
            "firstname": "Zed",
            "contact_last_name": "Quinn",
            "template": " Warm Lead ",
        }));
        assert_eq!(f.template_key, "warm_lead");
        assert_eq!(f.vars["first_name"], "Zed");
        assert_eq!(f.vars["last_name"], "Quinn");
        assert_eq!(f.subject, "Quick follow-up, Zed");
    }

    #[test]
    fn template_key_field_beats_template() {
        let f = follow_up(json!({
            "row_number": 2,
            "email": "a@b.com",
            "template_key": "renewal",
            "template": "other",
        }));
        assert_eq!(f.template_key, "renewal");
    }

    #[test]
    fn vars_layer_canonical_fields_over_row() {
        let f = follow_up(json!({
            "row_number": 4,
            "contact_email": "x@y.com",
            "company": "Acme",
            "status": "  warm ",
        }));
        assert_eq!(f.recipient, "x@y.com");
        assert_eq!(f.vars["email"], "x@y.com");
        assert_eq!(f.vars["company"], "Acme");
        assert_eq!(f.vars["status"], "warm");
        assert_eq!(f.vars["first_name"], "");
    }
}

//! Recipient resolution.
//!
//! Known recipient columns are checked first, in priority order. Only when
//! none of them holds an email-shaped value do we fall back to scanning any
//! column whose name mentions "email".

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::pipeline::row::Row;

/// Known recipient columns, highest priority first.
pub const RECIPIENT_KEYS: &[&str] = &[
    "email",
    "recipient_email",
    "to",
    "email_address",
    "client_email",
    "lead_email",
    "contact_email",
    "agent_email",
];

/// `local@domain.tld` with no whitespace. Looser than RFC 5322: values like
/// `a..b@x.com` pass here and are rejected later by the message builder,
/// which turns the row into a failure rather than a skip.
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Which lookup produced the recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSource {
    /// One of [`RECIPIENT_KEYS`].
    Known { field: String },
    /// Heuristic scan over columns containing "email".
    Heuristic { field: String },
}

/// An email-shaped address pulled from a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    pub source: RecipientSource,
}

impl Recipient {
    pub fn field(&self) -> &str {
        match &self.source {
            RecipientSource::Known { field } | RecipientSource::Heuristic { field } => field,
        }
    }

    pub fn is_heuristic(&self) -> bool {
        matches!(self.source, RecipientSource::Heuristic { .. })
    }
}

/// Minimal `local@domain.tld` shape check on the trimmed value.
pub fn is_likely_email(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && EMAIL_SHAPE.is_match(value)
}

/// Find the recipient for a row, or `None` when nothing email-shaped exists.
pub fn pick_recipient(row: &Row) -> Option<Recipient> {
    if let Some(recipient) = pick_known(row) {
        return Some(recipient);
    }

    let recipient = pick_heuristic(row);
    match &recipient {
        Some(r) => info!(
            row = row.row_number(),
            field = %r.field(),
            "Recipient recovered by heuristic column scan"
        ),
        None => debug!(row = row.row_number(), "No email-shaped value in row"),
    }
    recipient
}

/// Primary lookup over [`RECIPIENT_KEYS`].
fn pick_known(row: &Row) -> Option<Recipient> {
    RECIPIENT_KEYS.iter().find_map(|key| {
        row.text(key).filter(|v| is_likely_email(v)).map(|v| Recipient {
            address: v.to_string(),
            source: RecipientSource::Known {
                field: (*key).to_string(),
            },
        })
    })
}

/// Fallback: first column (in source order) named like an email column.
fn pick_heuristic(row: &Row) -> Option<Recipient> {
    row.string_fields()
        .filter(|(key, _)| key.contains("email"))
        .find_map(|(key, value)| {
            let candidate = value.trim();
            is_likely_email(candidate).then(|| Recipient {
                address: candidate.to_string(),
                source: RecipientSource::Heuristic {
                    field: key.to_string(),
                },
            })
        })
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

    #[test]
    fn email_shape() {
        assert!(is_likely_email("a@b.com"));
        assert!(is_likely_email("  first.last+tag@sub.example.co  "));
        assert!(!is_likely_email(""));
        assert!(!is_likely_email("not an email"));
        assert!(!is_likely_email("a@b"));
        assert!(!is_likely_email("a@@b.com"));
        assert!(!is_likely_email("a b@c.com"));
        assert!(!is_likely_email("@b.com"));
    }

    #[test]
    fn known_field_wins() {
        let r = pick_recipient(&row(json!({
            "row_number": 2,
            "contact_email": "other@x.com",
            "email": " a@b.com ",
        })))
        .unwrap();
        assert_eq!(r.address, "a@b.com");
        assert_eq!(r.source, RecipientSource::Known { field: "email".into() });
    }

    #[test]
    fn priority_order_respected() {
        let r = pick_recipient(&row(json!({
            "row_number": 2,
            "to": "to@x.com",
            "recipient_email": "rec@x.com",
        })))
        .unwrap();
        assert_eq!(r.address, "rec@x.com");
    }

    #[test]
    fn malformed_known_field_skipped_for_next_known_field() {
        let r = pick_recipient(&row(json!({
            "row_number": 2,
            "email": "n/a",
            "to": "to@x.com",
        })))
        .unwrap();
        assert_eq!(r.address, "to@x.com");
        assert!(!r.is_heuristic());
    }

    #[test]
    fn heuristic_scan_recovers_nonstandard_column() {
        let r = pick_recipient(&row(json!({
            "row_number": 4,
            "name": "x@y.com",
            "work_email_primary": "x@y.com",
        })))
        .unwrap();
        assert_eq!(r.address, "x@y.com");
        assert!(r.is_heuristic());
        assert_eq!(r.field(), "work_email_primary");
    }

    #[test]
    fn heuristic_ignores_non_email_columns() {
        let result = pick_recipient(&row(json!({
            "row_number": 5,
            "notes": "reach me at z@q.com",
            "phone": "z@q.com",
        })));
        assert!(result.is_none());
    }

    #[test]
    fn heuristic_takes_first_valid_in_column_order() {
        let r = pick_recipient(&row(json!({
            "row_number": 6,
            "backup_email": "nope",
            "alt_email": "first@x.com",
            "other_email": "second@x.com",
        })))
        .unwrap();
        assert_eq!(r.address, "first@x.com");
    }

    #[test]
    fn nothing_email_shaped_returns_none() {
        assert!(pick_recipient(&row(json!({"row_number": 3, "should_send": "no"}))).is_none());
        assert!(pick_recipient(&row(json!({"row_number": 3, "email": "  "}))).is_none());
        assert!(pick_recipient(&row(json!({"row_number": 3, "lead_email": "tbd"}))).is_none());
    }
}

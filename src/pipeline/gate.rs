//! Approval gate.
//!
//! Rows without any gate column are processed. A gate column that is
//! present must carry one of a closed set of affirmative tokens.

use crate::pipeline::row::Row;

/// Gate columns, highest priority first.
pub const GATE_KEYS: &[&str] = &["should_send", "run", "send", "ready_to_send"];

/// Affirmative tokens (compared lowercase, trimmed).
pub const ALLOWED_GATE_VALUES: &[&str] =
    &["yes", "y", "true", "1", "send", "ready", "go", "approved"];

/// Outcome of evaluating a row's gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// No non-empty gate value; eligible by default.
    Ungated,
    /// Gate value in the allow-set.
    Approved { value: String },
    /// Gate value present but not affirmative.
    NotApproved { value: String },
}

impl GateDecision {
    pub fn is_eligible(&self) -> bool {
        !matches!(self, Self::NotApproved { .. })
    }
}

/// Evaluate the gate of a row.
pub fn evaluate_gate(row: &Row) -> GateDecision {
    let Some(raw) = row.first_text(GATE_KEYS) else {
        return GateDecision::Ungated;
    };

    let value = raw.to_lowercase();
    if ALLOWED_GATE_VALUES.contains(&value.as_str()) {
        GateDecision::Approved { value }
    } else {
        GateDecision::NotApproved { value }
    }
}

/// Convenience predicate over [`evaluate_gate`].
pub fn should_process_row(row: &Row) -> bool {
    evaluate_gate(row).is_eligible()
}

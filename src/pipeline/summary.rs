//! Run statistics with bounded diagnostic samples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mailer::DeliveryOutcome;

/// Maximum entries kept in each sample list.
pub const MAX_SAMPLES: usize = 10;

/// Why a row was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidRowShape,
    MissingRecipientEmail,
    GateNotApproved,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRowShape => "invalid_row_shape",
            Self::MissingRecipientEmail => "missing_recipient_email",
            Self::GateNotApproved => "gate_not_approved",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipSample {
    pub row_number: Option<u64>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailSample {
    pub row_number: u64,
    pub message: String,
}

/// Aggregate result of one pass over the row source.
///
/// Every row lands in exactly one of `skipped`, `failed`, `sent` or
/// `drafted`; `attempted == sent + drafted + failed` holds at all times.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub scanned: u64,
    pub attempted: u64,
    pub sent: u64,
    pub drafted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub skip_reasons: BTreeMap<String, u64>,
    pub fail_reasons: BTreeMap<String, u64>,
    pub skip_samples: Vec<SkipSample>,
    pub fail_samples: Vec<FailSample>,
}

impl RunSummary {
    /// Fresh summary for a run over `scanned` rows.
    pub fn new(scanned: u64) -> Self {
        Self {
            scanned,
            ..Self::default()
        }
    }

    pub fn record_skip(&mut self, reason: SkipReason, row_number: Option<u64>) {
        self.skipped += 1;
        *self
            .skip_reasons
            .entry(reason.as_str().to_string())
            .or_insert(0) += 1;
        if self.skip_samples.len() < MAX_SAMPLES {
            self.skip_samples.push(SkipSample { row_number, reason });
        }
    }

    /// Row passed recipient and gate checks.
    pub fn record_attempt(&mut self) {
        self.attempted += 1;
    }

    pub fn record_delivery(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Sent => self.sent += 1,
            DeliveryOutcome::Drafted => self.drafted += 1,
        }
    }

    pub fn record_failure(&mut self, row_number: u64, message: impl Into<String>) {
        let message = message.into();
        self.failed += 1;
        *self.fail_reasons.entry(message.clone()).or_insert(0) += 1;
        if self.fail_samples.len() < MAX_SAMPLES {
            self.fail_samples.push(FailSample {
                row_number,
                message,
            });
        }
    }

    /// Rows that completed dispatch, successfully or not.
    pub fn completed(&self) -> u64 {
        self.sent + self.drafted + self.failed
    }
}

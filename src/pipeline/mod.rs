//! Per-row follow-up pipeline.
//!
//! Every row read from the follow-up tab flows through:
//! 1. `Row::normalize()`: shape check on the raw record
//! 2. `pick_recipient()`: known columns first, then a heuristic scan
//! 3. `evaluate_gate()`: closed vocabulary of approval tokens
//! 4. `FollowUpJob`: template, render, draft or send, audit
//!
//! Skips and failures are counted separately in [`RunSummary`].

pub mod follow_up;
pub mod gate;
pub mod recipient;
pub mod row;
pub mod summary;

pub use follow_up::{FollowUp, FollowUpJob};
pub use gate::{GateDecision, evaluate_gate, should_process_row};
pub use recipient::{Recipient, RecipientSource, is_likely_email, pick_recipient};
pub use row::{RawRow, Row, ShapeError};
pub use summary::{FailSample, MAX_SAMPLES, RunSummary, SkipReason, SkipSample};

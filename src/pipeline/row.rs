//! Row normalization: raw spreadsheet records into typed rows.
//!
//! Rows are an open schema: a handful of recognized fields must be strings
//! when present, everything else passes through untouched.

use serde_json::{Map, Value};

/// A raw record as read from the row store, keyed by column name.
pub type RawRow = Map<String, Value>;

/// Key carrying the 1-based source position.
pub const ROW_NUMBER_KEY: &str = "row_number";

/// Fields that must be strings when present.
pub const RECOGNIZED_FIELDS: &[&str] = &[
    "email",
    "recipient_email",
    "to",
    "first_name",
    "last_name",
    "status",
    "template",
    "template_key",
    "subject",
    "run",
    "should_send",
];

/// Why a raw record could not be turned into a [`Row`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// `row_number` absent, non-numeric or not a positive integer.
    RowNumber,
    /// A recognized field held a non-string value.
    NotAString(String),
}

/// A normalized row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    row_number: u64,
    fields: Map<String, Value>,
}

impl Row {
    /// Validate and normalize a raw record.
    ///
    /// Field names are normalized (see [`normalize_field_name`]); a later
    /// column whose name collides with an earlier one overwrites its value.
    pub fn normalize(raw: &RawRow) -> Result<Self, ShapeError> {
        let row_number = raw_row_number(raw).ok_or(ShapeError::RowNumber)?;

        let mut fields = Map::with_capacity(raw.len());
        for (key, value) in raw {
            if key == ROW_NUMBER_KEY {
                continue;
            }
            let name = normalize_field_name(key);
            if name.is_empty() || name == ROW_NUMBER_KEY {
                continue;
            }
            if RECOGNIZED_FIELDS.contains(&name.as_str()) && !value.is_string() {
                return Err(ShapeError::NotAString(name));
            }
            fields.insert(name, value.clone());
        }

        Ok(Self { row_number, fields })
    }

    /// 1-based position in the source (header row is row 1).
    pub fn row_number(&self) -> u64 {
        self.row_number
    }

    /// Field value as stored, whatever its type.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Raw string value of a field, untrimmed.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Trimmed string value of a field; `None` when absent or blank.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// First non-blank value among `keys`, in priority order.
    pub fn first_text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.text(key))
    }

    /// String-valued fields in source column order.
    pub fn string_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.as_str(), s)))
    }
}

/// Positive whole-number `row_number` of a raw record.
///
/// Floats are accepted when they carry no fraction (`2.0`, not `2.5`).
pub fn raw_row_number(raw: &RawRow) -> Option<u64> {
    let value = raw.get(ROW_NUMBER_KEY)?;
    let n = match value.as_u64() {
        Some(n) => n,
        None => {
            let f = value.as_f64()?;
            if !f.is_finite() || f.fract() != 0.0 || f < 1.0 || f > u64::MAX as f64 {
                return None;
            }
            f as u64
        }
    };
    (n > 0).then_some(n)
}

/// Normalize a column header or field name.
///
/// Trim, lowercase, collapse each run of non-alphanumerics to `_`, strip
/// leading and trailing `_`. `"First Name"` becomes `first_name`.
pub fn normalize_field_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    out
}

//! Google Sheets adapter over the `spreadsheets.values` REST API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::StoreError;
use crate::google::{AccessTokenSource, error_message};
use crate::pipeline::row::{RawRow, ROW_NUMBER_KEY, normalize_field_name};
use crate::store::RowStore;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Sheets-backed [`RowStore`].
pub struct SheetsStore {
    client: reqwest::Client,
    tokens: Arc<dyn AccessTokenSource>,
    base_url: String,
}

impl SheetsStore {
    pub fn new(client: reqwest::Client, tokens: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            client,
            tokens,
            base_url: SHEETS_API_BASE.to_string(),
        }
    }

    /// Point at a different API root (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `{base}/{spreadsheet}/values/{range}{suffix}` with each segment escaped.
    fn values_url(&self, sheet_id: &str, range: &str, suffix: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| StoreError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| StoreError::Url(format!("cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .push(sheet_id)
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            message: error_message(status.as_u16(), &body),
        })
    }
}

#[async_trait]
impl RowStore for SheetsStore {
    async fn read_rows(&self, source_id: &str, tab: &str) -> Result<Vec<RawRow>, StoreError> {
        let url = self.values_url(source_id, &format!("{tab}!A1:ZZ"), "")?;
        let token = self.tokens.access_token().await?;
        let resp = self.client.get(url).bearer_auth(token).send().await?;
        let range: ValueRange = Self::check(resp).await?.json().await?;

        let rows = rows_from_values(range.values);
        debug!(tab, rows = rows.len(), "Read sheet rows");
        Ok(rows)
    }

    async fn append_row(
        &self,
        source_id: &str,
        tab: &str,
        values: Vec<Value>,
    ) -> Result<(), StoreError> {
        let mut url = self.values_url(source_id, &format!("{tab}!A:ZZ"), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let token = self.tokens.access_token().await?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}

/// Turn a header row plus data rows into keyed records.
///
/// Headers are normalized; a blank header becomes `column_{n}`. Short rows
/// are padded with empty strings and every record gets `row_number`
/// (`index + 2`, the header being row 1).
pub fn rows_from_values(values: Vec<Vec<Value>>) -> Vec<RawRow> {
    let mut iter = values.into_iter();
    let Some(header_row) = iter.next() else {
        return Vec::new();
    };

    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = normalize_field_name(&cell_text(cell));
            if name.is_empty() {
                format!("column_{}", i + 1)
            } else {
                name
            }
        })
        .collect();

    iter.enumerate()
        .map(|(index, cells)| {
            let mut row = RawRow::new();
            row.insert(ROW_NUMBER_KEY.to_string(), json!(index + 2));
            for (i, header) in headers.iter().enumerate() {
                let value = match cells.get(i) {
                    None | Some(Value::Null) => Value::String(String::new()),
                    Some(v) => v.clone(),
                };
                row.insert(header.clone(), value);
            }
            row
        })
        .collect()
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    struct StaticToken;

    #[async_trait]
    impl AccessTokenSource for StaticToken {
        async fn access_token(&self) -> Result<String, AuthError> {
            Ok("token".into())
        }
    }

    fn store() -> SheetsStore {
        SheetsStore::new(reqwest::Client::new(), Arc::new(StaticToken))
    }

    #[test]
    fn empty_sheet_has_no_rows() {
        assert!(rows_from_values(vec![]).is_empty());
        assert!(rows_from_values(vec![vec![json!("Email")]]).is_empty());
    }

    #[test]
    fn rows_keyed_by_normalized_header() {
        let rows = rows_from_values(vec![
            vec![json!("First Name"), json!("Email"), json!("Should Send?")],
            vec![json!("Ann"), json!("a@b.com"), json!("yes")],
            vec![json!("Bo")],
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["row_number"], 2);
        assert_eq!(rows[0]["first_name"], "Ann");
        assert_eq!(rows[0]["email"], "a@b.com");
        assert_eq!(rows[0]["should_send"], "yes");

        assert_eq!(rows[1]["row_number"], 3);
        assert_eq!(rows[1]["email"], "");
        assert_eq!(rows[1]["should_send"], "");
    }

    #[test]
    fn blank_headers_get_positional_names() {
        let rows = rows_from_values(vec![
            vec![json!("Email"), json!(""), json!("  ")],
            vec![json!("a@b.com"), json!("x"), json!("y")],
        ]);
        assert_eq!(rows[0]["column_2"], "x");
        assert_eq!(rows[0]["column_3"], "y");
    }

    #[test]
    fn header_order_preserved() {
        let rows = rows_from_values(vec![
            vec![json!("Zeta"), json!("Alpha")],
            vec![json!("1"), json!("2")],
        ]);
        let keys: Vec<_> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["row_number", "zeta", "alpha"]);
    }

    #[test]
    fn range_is_escaped_in_path() {
        let url = store()
            .values_url("sheet-1", "Agent Follow Up!A1:ZZ", "")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/Agent%20Follow%20Up!A1:ZZ"
        );
    }

    #[test]
    fn append_suffix_kept_on_range_segment() {
        let url = store()
            .with_base_url("http://localhost:9000/v4/spreadsheets/")
            .values_url("s", "Email Log!A:ZZ", ":append")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/v4/spreadsheets/s/values/Email%20Log!A:ZZ:append"
        );
    }
}

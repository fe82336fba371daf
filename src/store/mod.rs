//! Row store: the spreadsheet the job reads leads from and logs to.

pub mod sheets;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::pipeline::row::RawRow;

pub use sheets::SheetsStore;

/// Backend-agnostic tabular store.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Read every data row of a tab.
    ///
    /// Each record is keyed by normalized header name and carries a 1-based
    /// `row_number` counting the header as row 1.
    async fn read_rows(&self, source_id: &str, tab: &str) -> Result<Vec<RawRow>, StoreError>;

    /// Append one row of positional values to a tab.
    async fn append_row(&self, source_id: &str, tab: &str, values: Vec<Value>)
    -> Result<(), StoreError>;
}

use async_trait::async_trait;

use crate::Result;

/// Hexagonal port for the remote tabular store (a spreadsheet).
///
/// Rows are plain cell strings. Implementations surface transport or
/// permission failures as [`crate::Error::Store`] and never retry.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Create `name` with `headers` as its first row, or rewrite the first row
    /// if it differs from `headers`. Calling it again is a no-op.
    async fn ensure_worksheet(&self, name: &str, headers: &[&str]) -> Result<()>;

    /// Append one row after the last non-empty row of `name`.
    async fn append_row(&self, name: &str, values: &[String]) -> Result<()>;

    /// All rows of `name` in sheet order (header included), truncated to the
    /// first `limit` rows when a limit is given.
    async fn get_rows(&self, name: &str, limit: Option<usize>) -> Result<Vec<Vec<String>>>;
}

pub mod duck;
pub mod schema;

pub use duck::{DuckConnector, DuckStore};
pub use schema::{ColumnDef, ColumnType, TableSchema};

use anyhow::Result;

use crate::records::MappedRecord;

/// Relational sink for dataset tables.
pub trait TableStore {
    /// Discard `schema.name` and rewrite it from `records` in one atomic step.
    /// Returns the number of rows written.
    fn replace_table(&mut self, schema: &TableSchema, records: &[MappedRecord]) -> Result<usize>;

    /// Row count, or `None` when the table does not exist.
    fn row_count(&self, table: &str) -> Result<Option<u64>>;

    /// Every `state_code` in `table`, sorted, duplicates kept.
    fn state_codes(&self, table: &str) -> Result<Vec<String>>;

    /// Rows where any of `columns` is NULL.
    fn count_null_rows(&self, table: &str, columns: &[&str]) -> Result<u64>;

    /// Rows where any of `columns` lies outside `[lo, hi]`.
    fn count_out_of_range(&self, table: &str, columns: &[&str], lo: f64, hi: f64) -> Result<u64>;
}

/// Opens the single store connection used by a run.
pub trait Connector {
    type Store: TableStore;

    fn connect(&self) -> Result<Self::Store>;
}

//! Table store capability.

use crate::Result;
use polars::prelude::DataFrame;

/// An opaque key-value store of named tables.
///
/// Loading a table that does not exist returns
/// [`VantageError::MissingTable`](crate::VantageError::MissingTable).
pub trait TableStore: Send + Sync + std::fmt::Debug {
    /// Backend name, e.g. `parquet`.
    fn name(&self) -> &str;

    /// Persist `data` under `table`, replacing any previous contents.
    fn save(&self, table: &str, data: &DataFrame) -> Result<()>;

    /// Load a table.
    fn load(&self, table: &str) -> Result<DataFrame>;

    /// Whether `table` has been saved.
    fn exists(&self, table: &str) -> bool;
}

//! Storage backends for vantage.
//!
//! Every pipeline stage reads and writes named tables through the
//! [`TableStore`](vantage_traits::TableStore) capability. This crate ships
//! two implementations and a JSON document store for the small artifacts
//! (`selected_features`, `backtest_summary`, `sharpe_contour`).
//!
//! # Usage
//!
//! ```rust,ignore
//! use vantage_store::{StorageBackend, open_store};
//!
//! let store = open_store("parquet".parse()?, "data")?;
//! store.save("ohlcv", &prices.to_dataframe()?)?;
//! let df = store.load("ohlcv")?;
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod backend;
mod document;
mod memory;
mod parquet;

pub use backend::{StorageBackend, open_store};
pub use document::DocumentStore;
pub use memory::MemoryStore;
pub use parquet::ParquetStore;

use vantage_traits::{Result, VantageError};

/// Reject names that would escape the store's directory.
pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(VantageError::Configuration(format!("invalid table name {name:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_name() {
        assert!(check_name("ohlcv").is_ok());
        assert!(check_name("wf_step_03").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("../etc").is_err());
        assert!(check_name("a/b").is_err());
    }
}

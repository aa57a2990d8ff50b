//! Directory of parquet files, one per table.

use crate::check_name;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;
use vantage_traits::fs::write_atomic;
use vantage_traits::{Result, TableStore, VantageError};

/// Stores each table as `<root>/<table>.parquet`.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.parquet"))
    }
}

impl TableStore for ParquetStore {
    fn name(&self) -> &str {
        "parquet"
    }

    fn save(&self, table: &str, data: &DataFrame) -> Result<()> {
        check_name(table)?;
        let mut df = data.clone();
        let mut buf = Vec::new();
        ParquetWriter::new(&mut buf).finish(&mut df)?;
        write_atomic(&self.path(table), &buf)?;
        debug!(table, rows = df.height(), "saved table");
        Ok(())
    }

    fn load(&self, table: &str) -> Result<DataFrame> {
        check_name(table)?;
        let path = self.path(table);
        if !path.exists() {
            return Err(VantageError::MissingTable(table.to_string()));
        }
        let file = File::open(&path)?;
        Ok(ParquetReader::new(file).finish()?)
    }

    fn exists(&self, table: &str) -> bool {
        check_name(table).is_ok() && self.path(table).exists()
    }
}

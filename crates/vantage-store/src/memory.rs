//! In-process table store.

use crate::check_name;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use vantage_traits::{Result, TableStore, VantageError};

/// Keeps tables in memory. Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, DataFrame>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the stored tables, sorted.
    pub fn tables(&self) -> Vec<String> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.keys().cloned().collect()
    }
}

impl TableStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn save(&self, table: &str, data: &DataFrame) -> Result<()> {
        check_name(table)?;
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.insert(table.to_string(), data.clone());
        Ok(())
    }

    fn load(&self, table: &str) -> Result<DataFrame> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(table)
            .cloned()
            .ok_or_else(|| VantageError::MissingTable(table.to_string()))
    }

    fn exists(&self, table: &str) -> bool {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.contains_key(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_round_trip_and_replace() {
        let store = MemoryStore::new();
        let a = df!("x" => [1.0, 2.0]).unwrap();
        let b = df!("x" => [3.0]).unwrap();
        store.save("t", &a).unwrap();
        store.save("t", &b).unwrap();
        assert_eq!(store.load("t").unwrap().height(), 1);
        assert_eq!(store.tables(), vec!["t".to_string()]);
        assert!(matches!(store.load("u"), Err(VantageError::MissingTable(_))));
    }
}

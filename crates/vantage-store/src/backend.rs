//! Backend selection.

use crate::{MemoryStore, ParquetStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use vantage_traits::{Result, TableStore, VantageError};

/// Available table store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// A directory of parquet files.
    #[default]
    Parquet,
    /// Process memory.
    Memory,
}

impl StorageBackend {
    /// Get the backend name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = VantageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parquet" => Ok(Self::Parquet),
            "memory" => Ok(Self::Memory),
            other => Err(VantageError::Configuration(format!(
                "unknown storage backend {other:?} (expected parquet or memory)"
            ))),
        }
    }
}

/// Construct a table store. `data_dir` is ignored by the memory backend.
pub fn open_store(backend: StorageBackend, data_dir: impl AsRef<Path>) -> Result<Arc<dyn TableStore>> {
    info!(%backend, dir = %data_dir.as_ref().display(), "opening table store");
    Ok(match backend {
        StorageBackend::Parquet => Arc::new(ParquetStore::open(data_dir.as_ref())?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    })
}

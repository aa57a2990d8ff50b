//! JSON documents.

use crate::check_name;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;
use vantage_traits::fs::write_json_atomic;
use vantage_traits::{Result, VantageError};

/// Stores each document as pretty JSON at `<root>/<name>.json`.
///
/// Writes go through a temporary sibling and a rename, so a concurrent
/// reader never sees a half-written document.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
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

    /// Path of document `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    /// Write a document, replacing any previous version.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        check_name(name)?;
        write_json_atomic(&self.path(name), value)?;
        debug!(document = name, "saved document");
        Ok(())
    }

    /// Read a document.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::MissingTable`] if the document was never saved.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        check_name(name)?;
        let path = self.path(name);
        if !path.exists() {
            return Err(VantageError::MissingTable(name.to_string()));
        }
        let bytes = std::fs::read(&path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Whether document `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        check_name(name).is_ok() && self.path(name).exists()
    }
}

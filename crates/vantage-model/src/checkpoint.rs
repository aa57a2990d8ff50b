//! Per-window training checkpoints.
//!
//! A finished window is persisted as `wf_step_{k:02}.json`. When training is
//! rerun, a checkpoint whose dates match the window is reused instead of
//! retraining it.

use crate::model::ModelFamily;
use crate::window::WalkForwardWindow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use vantage_traits::Result;
use vantage_traits::fs::write_json_atomic;

/// Result of training one walk-forward window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowCheckpoint {
    /// Window index and dates.
    pub window: WalkForwardWindow,
    /// Validation IC per family.
    pub model_ics: BTreeMap<ModelFamily, f64>,
    /// Validation IC of the two-model ensemble.
    pub ensemble_ic: f64,
    /// The two best families, sorted.
    pub top2_models: Vec<ModelFamily>,
    /// Clean training rows.
    pub n_train: usize,
    /// Clean validation rows.
    pub n_val: usize,
}

/// Directory of window checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Use `dir` for checkpoints. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of window `k`'s checkpoint.
    pub fn path(&self, k: usize) -> PathBuf {
        self.dir.join(format!("wf_step_{k:02}.json"))
    }

    /// Load the checkpoint of `window` if one exists for the same dates.
    ///
    /// An unreadable or stale checkpoint is logged and ignored.
    pub fn load(&self, window: &WalkForwardWindow) -> Option<WindowCheckpoint> {
        let path = self.path(window.index);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice::<WindowCheckpoint>(&bytes) {
            Ok(ckpt) if ckpt.window == *window => Some(ckpt),
            Ok(_) => {
                warn!(path = %path.display(), "checkpoint dates differ from window, retraining");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable checkpoint, retraining");
                None
            }
        }
    }

    /// Persist a checkpoint atomically.
    pub fn save(&self, ckpt: &WindowCheckpoint) -> Result<()> {
        write_json_atomic(&self.path(ckpt.window.index), ckpt)
    }
}

//! Versioned model bundles and the bundle registry.
//!
//! Layout under the registry root:
//!
//! ```text
//! <root>/
//!   v1_20240301_120000/
//!     meta.json
//!     scaler.json
//!     gbt_depth.json
//!     ridge.json
//!   LATEST                 # name of the current version
//!   model_registry.jsonl   # one meta document per line, append-only
//! ```
//!
//! A bundle is written into a staging directory and renamed into place
//! before `LATEST` is replaced, so `LATEST` never names a partial bundle.

use crate::model::{FittedModel, ModelFamily};
use crate::scaler::RobustScaler;
use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use vantage_traits::fs::{write_atomic, write_json_atomic};
use vantage_traits::{FactorPanel, Result, ScoreSource, VantageError};

const META_FILE: &str = "meta.json";
const SCALER_FILE: &str = "scaler.json";
const LATEST_FILE: &str = "LATEST";
const REGISTRY_FILE: &str = "model_registry.jsonl";

/// Bundle metadata, written as `meta.json` and appended to the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMeta {
    /// Unique version string.
    pub version: String,
    /// Feature columns, in model input order.
    pub features: Vec<String>,
    /// Families averaged by the ensemble.
    pub ensemble: Vec<ModelFamily>,
    /// How validation windows were generated.
    pub split_strategy: String,
    /// Number of walk-forward windows trained.
    pub wf_steps: usize,
    /// Mean ensemble validation IC across windows.
    pub avg_ensemble_ic: f64,
    /// Training completion time.
    pub trained_at: DateTime<Utc>,
}

/// A self-contained trained model: scaler, ensemble members and metadata.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    /// Metadata.
    pub meta: BundleMeta,
    /// Scaler fitted on the final training rows.
    pub scaler: RobustScaler,
    /// Ensemble members.
    pub models: Vec<(ModelFamily, FittedModel)>,
}

/// Default version string for a training time.
pub fn version_for(at: DateTime<Utc>) -> String {
    at.format("v1_%Y%m%d_%H%M%S").to_string()
}

impl ModelBundle {
    /// Ensemble prediction for every row of `panel`. Missing feature values
    /// are imputed as zero before scaling.
    pub fn predict(&self, panel: &FactorPanel) -> Result<Array1<f64>> {
        if self.models.is_empty() {
            return Err(VantageError::ModelUnavailable(format!(
                "bundle {} has no models",
                self.meta.version
            )));
        }
        let x = panel.feature_matrix(&self.meta.features)?;
        let x = self.scaler.transform(x.view())?;
        let mut sum = Array1::<f64>::zeros(x.nrows());
        for (_, model) in &self.models {
            sum += &model.predict(x.view());
        }
        Ok(sum / self.models.len() as f64)
    }
}

impl ScoreSource for ModelBundle {
    fn name(&self) -> &str {
        "ml"
    }

    fn required_columns(&self) -> Vec<String> {
        self.meta.features.clone()
    }

    fn score(&self, panel: &FactorPanel) -> Result<Vec<f64>> {
        Ok(self.predict(panel)?.to_vec())
    }
}

/// Filesystem registry of model bundles.
#[derive(Debug, Clone)]
pub struct BundleRegistry {
    root: PathBuf,
}

impl BundleRegistry {
    /// Open a registry rooted at `root`. Nothing is created until a save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Registry root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    fn unique_version(&self, base: &str) -> String {
        if !self.version_dir(base).exists() {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|v| !self.version_dir(v).exists())
            .unwrap_or_else(|| base.to_string())
    }

    /// Persist `bundle` as a new version and make it the latest.
    ///
    /// The bundle's version is replaced by a unique one (suffixed `_N` when
    /// the base version is taken). Returns the version written.
    pub fn save(&self, bundle: &mut ModelBundle) -> Result<String> {
        fs::create_dir_all(&self.root)?;
        let version = self.unique_version(&version_for(bundle.meta.trained_at));
        bundle.meta.version = version.clone();

        let staging = self.root.join(format!(".staging-{version}"));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        write_json_atomic(&staging.join(META_FILE), &bundle.meta)?;
        write_json_atomic(&staging.join(SCALER_FILE), &bundle.scaler)?;
        for (family, model) in &bundle.models {
            write_json_atomic(&staging.join(format!("{}.json", family.name())), model)?;
        }
        fs::rename(&staging, self.version_dir(&version))?;

        write_atomic(&self.root.join(LATEST_FILE), version.as_bytes())?;

        let mut registry = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(REGISTRY_FILE))?;
        writeln!(registry, "{}", serde_json::to_string(&bundle.meta)?)?;
        registry.sync_all()?;

        info!(%version, ensemble = ?bundle.meta.ensemble, "model bundle saved");
        Ok(version)
    }

    /// Version named by the latest pointer.
    pub fn latest_version(&self) -> Option<String> {
        fs::read_to_string(self.root.join(LATEST_FILE))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Load one version.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::ModelUnavailable`] if the version does not exist.
    pub fn load(&self, version: &str) -> Result<ModelBundle> {
        let dir = self.version_dir(version);
        if !dir.is_dir() {
            return Err(VantageError::ModelUnavailable(format!(
                "no bundle {version} under {}",
                self.root.display()
            )));
        }
        let meta: BundleMeta = serde_json::from_slice(&fs::read(dir.join(META_FILE))?)?;
        let scaler: RobustScaler = serde_json::from_slice(&fs::read(dir.join(SCALER_FILE))?)?;
        let models = meta
            .ensemble
            .iter()
            .map(|family| -> Result<(ModelFamily, FittedModel)> {
                let bytes = fs::read(dir.join(format!("{}.json", family.name())))?;
                Ok((*family, serde_json::from_slice(&bytes)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ModelBundle {
            meta,
            scaler,
            models,
        })
    }

    /// Load the latest bundle.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::ModelUnavailable`] if nothing has been trained.
    pub fn load_latest(&self) -> Result<ModelBundle> {
        let version = self.latest_version().ok_or_else(|| {
            VantageError::ModelUnavailable(format!("no trained model under {}", self.root.display()))
        })?;
        self.load(&version)
    }

    /// Every meta document ever registered, oldest first.
    pub fn history(&self) -> Result<Vec<BundleMeta>> {
        let path = self.root.join(REGISTRY_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        BufReader::new(fs::File::open(path)?)
            .lines()
            .filter(|l| !matches!(l, Ok(s) if s.trim().is_empty()))
            .map(|line| -> Result<BundleMeta> { Ok(serde_json::from_str(&line?)?) })
            .collect()
    }
}

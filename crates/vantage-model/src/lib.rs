//! Model training and serving for vantage.
//!
//! This crate provides:
//! - Estimators: histogram gradient-boosted trees (depth-wise and leaf-wise
//!   growth) and closed-form ridge regression
//! - A robust median/IQR scaler
//! - Seeded random-search tuning scored by validation IC
//! - The walk-forward trainer with resumable per-window checkpoints
//! - Versioned model bundles and their on-disk registry
//!
//! # Example
//!
//! ```ignore
//! use vantage_model::{BundleRegistry, TrainerConfig, WalkForwardTrainer};
//!
//! let trainer = WalkForwardTrainer::new(TrainerConfig::default());
//! let mut report = trainer.train(&panel, &features, chrono::Utc::now())?;
//! let version = BundleRegistry::new("models").save(&mut report.bundle)?;
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod bundle;
pub mod checkpoint;
pub mod gbt;
pub mod linalg;
pub mod model;
pub mod ridge;
pub mod scaler;
pub mod trainer;
pub mod tuning;
pub mod window;

pub use bundle::{BundleMeta, BundleRegistry, ModelBundle};
pub use checkpoint::{CheckpointStore, WindowCheckpoint};
pub use gbt::{BoosterParams, GradientBoostedTrees, Growth};
pub use model::{FittedModel, ModelFamily};
pub use ridge::Ridge;
pub use scaler::RobustScaler;
pub use trainer::{TrainerConfig, TrainingReport, WalkForwardTrainer};
pub use tuning::{SearchSpace, TuningConfig};
pub use window::{WalkForwardConfig, WalkForwardWindow, generate_windows};

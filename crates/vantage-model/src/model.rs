//! Candidate model families and the fitted-model enum.

use crate::gbt::{BoosterParams, GradientBoostedTrees, Growth};
use crate::ridge::Ridge;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vantage_traits::{Result, VantageError};

/// The three candidate model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Depth-wise boosted trees.
    GbtDepth,
    /// Leaf-wise boosted trees.
    GbtLeaf,
    /// Ridge regression.
    Ridge,
}

impl ModelFamily {
    /// Every family, in evaluation order.
    pub const ALL: [Self; 3] = [Self::GbtDepth, Self::GbtLeaf, Self::Ridge];

    /// Stable identifier, used for file names and reports.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GbtDepth => "gbt_depth",
            Self::GbtLeaf => "gbt_leaf",
            Self::Ridge => "ridge",
        }
    }

    /// Growth policy of the booster families.
    #[must_use]
    pub const fn growth(&self) -> Option<Growth> {
        match self {
            Self::GbtDepth => Some(Growth::DepthWise),
            Self::GbtLeaf => Some(Growth::LeafWise),
            Self::Ridge => None,
        }
    }

    /// Fit with the fixed production hyper-parameters.
    pub fn fit_production(&self, x: ArrayView2<'_, f64>, y: &Array1<f64>) -> Result<FittedModel> {
        match self.growth() {
            Some(growth) => {
                let params = BoosterParams {
                    growth,
                    ..BoosterParams::default()
                };
                Ok(FittedModel::Booster(GradientBoostedTrees::fit(x, y, &params)?))
            }
            None => Ok(FittedModel::Ridge(Ridge::fit(x, y, 1.0)?)),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = VantageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| VantageError::Configuration(format!("unknown model family '{s}'")))
    }
}

/// A fitted model of any family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    /// A boosted tree ensemble.
    Booster(GradientBoostedTrees),
    /// A ridge regression.
    Ridge(Ridge),
}

impl FittedModel {
    /// Predict every row of `x`.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        match self {
            Self::Booster(m) => m.predict(x),
            Self::Ridge(m) => m.predict(x),
        }
    }
}

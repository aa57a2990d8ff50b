//! Score source trait.
//!
//! A score source turns a factor cross-section into one score per row. The
//! ML ensemble and the model-free rule score both implement it, so the
//! signal generator can blend them without knowing which is which.

use crate::{FactorPanel, Result};

/// A producer of cross-sectional scores.
///
/// Implementations must be thread-safe so the parameter sweep can share
/// them across workers.
///
/// # Example
///
/// ```
/// use vantage_traits::{FactorPanel, Result, ScoreSource};
///
/// struct Constant;
///
/// impl ScoreSource for Constant {
///     fn name(&self) -> &str {
///         "constant"
///     }
///
///     fn required_columns(&self) -> Vec<String> {
///         Vec::new()
///     }
///
///     fn score(&self, panel: &FactorPanel) -> Result<Vec<f64>> {
///         Ok(vec![1.0; panel.len()])
///     }
/// }
///
/// let scores = Constant.score(&FactorPanel::default()).unwrap();
/// assert!(scores.is_empty());
/// ```
pub trait ScoreSource: Send + Sync {
    /// Identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Factor columns the source reads.
    fn required_columns(&self) -> Vec<String>;

    /// Score every row of `panel`. The output is aligned with
    /// [`FactorPanel::rows`].
    ///
    /// # Errors
    ///
    /// Returns an error if a required column is missing or the underlying
    /// model fails.
    fn score(&self, panel: &FactorPanel) -> Result<Vec<f64>>;
}

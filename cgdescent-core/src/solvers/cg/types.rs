use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::services::DotResult;

use super::orthogonalize::OrthogonalizationReport;

/// Configuration of the conjugate-gradient descent core.
///
/// Every field has a default, so a TOML document only needs the keys it
/// overrides:
///
/// ```toml
/// initial_step = 0.05
/// normalize = true
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConjugateGradient {
    /// Trial step length `tau` used at iteration 0.
    pub initial_step: f64,
    /// Gram-Schmidt the new gradient against the stored history.
    pub orthogonalize: bool,
    /// Scale the orthogonalized gradient to unit norm.
    pub normalize: bool,
    /// Recompute `<G(k+1),G(r)>` for every record after orthogonalization.
    pub verify_orthogonality: bool,
    /// Write `G(k+1)` to the history as record `k + 1` after orthogonalization.
    pub record_gradients: bool,
    /// Relative size below which the step-size denominator counts as zero.
    pub step_denominator_tol: f64,
    /// If true, logs the descent report of every iteration.
    pub verbose: bool,
    /// If true, keeps descent reports in the grid context.
    pub collect_trace: bool,
}

impl ConjugateGradient {
    pub fn new() -> Self {
        Self {
            initial_step: 1.0,
            orthogonalize: true,
            normalize: false,
            verify_orthogonality: false,
            record_gradients: true,
            step_denominator_tol: 1e-12,
            verbose: false,
            collect_trace: false,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.initial_step.is_finite() && self.initial_step > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "initial_step must be positive and finite, got {}",
                self.initial_step
            )));
        }
        if !(self.step_denominator_tol.is_finite() && self.step_denominator_tol >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "step_denominator_tol must be non-negative and finite, got {}",
                self.step_denominator_tol
            )));
        }
        if self.verify_orthogonality && !self.orthogonalize {
            return Err(Error::InvalidConfig(
                "verify_orthogonality requires orthogonalize".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConjugateGradient {
    fn default() -> Self {
        Self::new()
    }
}

/// Quantities computed by one inner iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct IterationReport {
    pub iteration: usize,
    pub tau: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Per-group Taylor adjustment subtracted from the cost.
    pub cost_adjust: DotResult,
    /// `<d(k),G(k)>`
    pub dot_dir_grad: f64,
    /// `<d(k),Ghat(k)>`
    pub dot_dir_trial: f64,
    /// `<G(k),G(k)>`
    pub grad_dot_old: f64,
    /// `<G(k+1),G(k+1)>` after orthogonalization
    pub grad_dot_new: f64,
    /// `<d(k+1),G(k+1)>` with the unorthogonalized gradient, kept for the next
    /// cost correction.
    pub cost_grad_dot: DotResult,
    pub orthogonalization: Option<OrthogonalizationReport>,
}

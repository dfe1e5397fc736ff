//! Fit outputs.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::domain::{ConvergenceStatus, FitWarning, LossKind, ModelKind, ModelSpec};
use crate::error::FitError;

/// Parameter covariance and standard errors, in parameter vector order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    matrix: Vec<Vec<f64>>,
    std_errors: Vec<f64>,
}

impl CovarianceMatrix {
    pub(crate) fn from_matrix(cov: &DMatrix<f64>) -> Self {
        let matrix: Vec<Vec<f64>> = (0..cov.nrows())
            .map(|i| (0..cov.ncols()).map(|j| cov[(i, j)]).collect())
            .collect();
        let std_errors = (0..cov.nrows()).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();
        Self { matrix, std_errors }
    }

    pub fn dim(&self) -> usize {
        self.std_errors.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[i][j]
    }

    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    pub fn std_errors(&self) -> &[f64] {
        &self.std_errors
    }

    /// Correlation coefficient between parameters `i` and `j` (0 when a variance vanishes).
    pub fn correlation(&self, i: usize, j: usize) -> f64 {
        let denom = self.std_errors[i] * self.std_errors[j];
        if denom > 0.0 {
            self.matrix[i][j] / denom
        } else {
            0.0
        }
    }
}

/// One reported parameter with its unit and (if available) standard error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEstimate {
    /// Machine name (`phi_mean`, `d`, `phi1`, `phi2`, `delta_phi`).
    pub name: String,
    pub unit: String,
    pub value: f64,
    pub std_error: Option<f64>,
    /// Derived from fitted parameters rather than fitted directly (BDR φ̄, Δφ).
    pub derived: bool,
}

/// Goodness-of-fit statistics on the unweighted residuals (A/m²).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    /// SSE / (n − p); `None` when there are no degrees of freedom.
    pub reduced_chi_square: Option<f64>,
    pub r_squared: f64,
    pub n_points: usize,
    pub n_params: usize,
}

impl FitQuality {
    pub fn from_residuals(observed: &[f64], residuals: &[f64], n_params: usize) -> Self {
        let n = residuals.len();
        let sse: f64 = residuals.iter().map(|r| r * r).sum();
        let rmse = if n > 0 { (sse / n as f64).sqrt() } else { 0.0 };
        let reduced_chi_square = (n > n_params).then(|| sse / (n - n_params) as f64);

        let mean = if n > 0 {
            observed.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };
        let sst: f64 = observed.iter().map(|y| (y - mean) * (y - mean)).sum();
        let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 1.0 };

        Self {
            sse,
            rmse,
            reduced_chi_square,
            r_squared,
            n_points: n,
            n_params,
        }
    }
}

/// Final iterate of the fitter, enough to recompute the covariance.
///
/// `jacobian` is ∂J_pred/∂p in A/m² per parameter unit (rows = points).
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergedState {
    pub(crate) kind: ModelKind,
    pub(crate) params: Vec<f64>,
    pub(crate) jacobian: DMatrix<f64>,
    pub(crate) residuals: Vec<f64>,
    pub(crate) weights: Vec<f64>,
}

impl ConvergedState {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Immutable outcome of one fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub(crate) model: ModelSpec,
    pub(crate) initial: ModelSpec,
    pub(crate) loss: LossKind,
    pub(crate) parameters: Vec<ParameterEstimate>,
    pub(crate) covariance: Result<CovarianceMatrix, FitError>,
    pub(crate) voltages: Vec<f64>,
    pub(crate) observed: Vec<f64>,
    pub(crate) fitted: Vec<f64>,
    pub(crate) residuals: Vec<f64>,
    pub(crate) weights: Vec<f64>,
    pub(crate) quality: FitQuality,
    pub(crate) iterations: usize,
    pub(crate) status: ConvergenceStatus,
    pub(crate) warnings: Vec<FitWarning>,
    pub(crate) temperature: Option<f64>,
    pub(crate) state: ConvergedState,
}

impl FitResult {
    /// Fitted model with its parameter values.
    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    /// Starting point the iteration began from (after projection into the bounds).
    pub fn initial(&self) -> &ModelSpec {
        &self.initial
    }

    pub fn loss(&self) -> LossKind {
        self.loss
    }

    /// Fitted and derived parameters with units and standard errors.
    pub fn parameters(&self) -> &[ParameterEstimate] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterEstimate> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Covariance of the fitted parameters, or why it is unavailable.
    pub fn covariance(&self) -> Result<&CovarianceMatrix, FitError> {
        self.covariance.as_ref().map_err(Clone::clone)
    }

    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    /// Observed current density (A/m²).
    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    /// Predicted current density at the fitted parameters (A/m²).
    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    /// `J_obs − J_pred` (A/m²), one per input point.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Final robust weights (all ones under L2).
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn quality(&self) -> &FitQuality {
        &self.quality
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn status(&self) -> ConvergenceStatus {
        self.status
    }

    pub fn warnings(&self) -> &[FitWarning] {
        &self.warnings
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn converged_state(&self) -> &ConvergedState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_from_residuals() {
        let q = FitQuality::from_residuals(&[1.0, 2.0, 3.0, 4.0], &[0.1, -0.1, 0.1, -0.1], 2);
        assert!((q.sse - 0.04).abs() < 1e-12);
        assert!((q.rmse - 0.1).abs() < 1e-12);
        assert!((q.reduced_chi_square.unwrap() - 0.02).abs() < 1e-12);
        assert!(q.r_squared > 0.99);

        let exact = FitQuality::from_residuals(&[1.0, 2.0], &[0.0, 0.0], 2);
        assert!(exact.reduced_chi_square.is_none());
    }

    #[test]
    fn covariance_std_errors_and_correlation() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 9.0]);
        let cov = CovarianceMatrix::from_matrix(&m);
        assert_eq!(cov.std_errors(), &[2.0, 3.0]);
        assert!((cov.correlation(0, 1) - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(cov.dim(), 2);
    }
}

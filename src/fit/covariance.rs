//! Parameter covariance from the final Jacobian.
//!
//! ```text
//! σ² = Σ w_i r_i² / (n − p)
//! C  = σ² (JᵗWJ)⁻¹
//! ```
//!
//! The inverse is formed through the SVD of `W^{1/2} J`, so a rank-deficient
//! Jacobian is detected from its singular values rather than from a failed
//! factorization. Under robust loss the final IRLS weights are used; this is the
//! usual working approximation, not the exact sandwich estimator.

use nalgebra::DMatrix;

use crate::domain::{ConvergedState, CovarianceMatrix, ModelSpec, ParameterEstimate};
use crate::error::FitError;

/// Unweighted covariance: `σ²·(JᵗJ)⁻¹` with `σ² = Σr²/(n−p)`.
pub fn covariance(
    jacobian: &DMatrix<f64>,
    residuals: &[f64],
    n_params: usize,
) -> Result<CovarianceMatrix, FitError> {
    let unit = vec![1.0; residuals.len()];
    weighted_covariance(jacobian, residuals, &unit, n_params)
}

/// Covariance with per-point weights.
pub fn weighted_covariance(
    jacobian: &DMatrix<f64>,
    residuals: &[f64],
    weights: &[f64],
    n_params: usize,
) -> Result<CovarianceMatrix, FitError> {
    let n = residuals.len();
    if n <= n_params {
        return Err(FitError::InsufficientData {
            n_points: n,
            n_params,
        });
    }
    if jacobian.nrows() != n || jacobian.ncols() != n_params || weights.len() != n {
        return Err(FitError::InvalidData(format!(
            "Covariance inputs disagree: jacobian {}x{}, {} residuals, {} weights, {} parameters",
            jacobian.nrows(),
            jacobian.ncols(),
            n,
            weights.len(),
            n_params
        )));
    }

    let weighted_sse: f64 = residuals
        .iter()
        .zip(weights)
        .map(|(r, w)| w * r * r)
        .sum();
    let sigma2 = weighted_sse / (n - n_params) as f64;

    let mut jw = jacobian.clone();
    for (i, w) in weights.iter().enumerate() {
        let sw = w.max(0.0).sqrt();
        for k in 0..n_params {
            jw[(i, k)] *= sw;
        }
    }

    let svd = jw.svd(false, true);
    let v_t = svd.v_t.ok_or(FitError::SingularJacobian)?;
    let s = &svd.singular_values;
    let s_max = s.iter().fold(0.0_f64, |m, v| m.max(*v));
    let s_min = s.iter().fold(f64::INFINITY, |m, v| m.min(*v));
    let threshold = f64::EPSILON * s_max * n.max(n_params) as f64;
    if !(s_max > 0.0 && s_min > threshold) {
        return Err(FitError::SingularJacobian);
    }

    // (JᵗJ)⁻¹ = V diag(1/s²) Vᵗ
    let mut cov = DMatrix::<f64>::zeros(n_params, n_params);
    for a in 0..n_params {
        for b in 0..n_params {
            cov[(a, b)] = sigma2
                * (0..s.len())
                    .map(|k| v_t[(k, a)] * v_t[(k, b)] / (s[k] * s[k]))
                    .sum::<f64>();
        }
    }
    if cov.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SingularJacobian);
    }
    Ok(CovarianceMatrix::from_matrix(&cov))
}

/// Recompute the covariance from a fitter's final state.
pub fn estimate_covariance(state: &ConvergedState) -> Result<CovarianceMatrix, FitError> {
    weighted_covariance(
        state.jacobian(),
        state.residuals(),
        state.weights(),
        state.kind().param_count(),
    )
}

/// Reported parameters with units and standard errors.
///
/// BDR additionally reports the derived `phi_mean` and `delta_phi`, with
/// standard errors propagated through the covariance.
pub fn parameter_estimates(
    model: &ModelSpec,
    cov: Option<&CovarianceMatrix>,
) -> Vec<ParameterEstimate> {
    let kind = model.kind();
    let values = model.values();
    let mut out: Vec<ParameterEstimate> = kind
        .param_names()
        .iter()
        .zip(kind.param_units())
        .zip(&values)
        .enumerate()
        .map(|(i, ((name, unit), &value))| ParameterEstimate {
            name: (*name).to_string(),
            unit: (*unit).to_string(),
            value,
            std_error: cov.map(|c| c.std_errors()[i]),
            derived: false,
        })
        .collect();

    if let ModelSpec::Bdr(p) = model {
        let var = |f: fn(&CovarianceMatrix) -> f64| cov.map(|c| f(c).max(0.0).sqrt());
        out.push(ParameterEstimate {
            name: "phi_mean".into(),
            unit: "eV".into(),
            value: p.mean_height(),
            std_error: var(|c| 0.25 * (c.get(0, 0) + c.get(1, 1) + 2.0 * c.get(0, 1))),
            derived: true,
        });
        out.push(ParameterEstimate {
            name: "delta_phi".into(),
            unit: "eV".into(),
            value: p.asymmetry(),
            std_error: var(|c| c.get(0, 0) + c.get(1, 1) - 2.0 * c.get(0, 1)),
            derived: true,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BdrParams, SimmonsParams};
    use approx::assert_relative_eq;

    #[test]
    fn linear_regression_standard_errors() {
        // y = a·x + b·x² with known residuals; compare against the explicit inverse.
        let x: [f64; 4] = [1.0, 2.0, 3.0, 4.0];
        let j = DMatrix::from_fn(4, 2, |i, k| x[i].powi(k as i32 + 1));
        let r = [0.1, -0.2, 0.15, -0.05];
        let cov = covariance(&j, &r, 2).unwrap();

        let sigma2: f64 = r.iter().map(|v| v * v).sum::<f64>() / 2.0;
        let jtj = j.transpose() * &j;
        let inv = jtj.try_inverse().unwrap() * sigma2;
        for a in 0..2 {
            for b in 0..2 {
                assert_relative_eq!(cov.get(a, b), inv[(a, b)], max_relative = 1e-9);
            }
        }
        assert_relative_eq!(cov.std_errors()[0], inv[(0, 0)].sqrt(), max_relative = 1e-9);
    }

    #[test]
    fn n_equal_p_is_insufficient() {
        let j = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            covariance(&j, &[0.0, 0.0], 2),
            Err(FitError::InsufficientData {
                n_points: 2,
                n_params: 2
            })
        );
    }

    #[test]
    fn parameter_without_influence_is_singular() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        assert_eq!(covariance(&j, &[0.1, 0.2, 0.3], 2), Err(FitError::SingularJacobian));
    }

    #[test]
    fn zero_weights_drop_points() {
        let j = DMatrix::from_row_slice(4, 1, &[1.0, 1.0, 1.0, 1.0]);
        let r = [0.1, -0.1, 0.1, 100.0];
        let robust = weighted_covariance(&j, &r, &[1.0, 1.0, 1.0, 0.0], 1).unwrap();
        let plain = covariance(&j, &r, 1).unwrap();
        assert!(robust.std_errors()[0] < plain.std_errors()[0]);
    }

    #[test]
    fn bdr_derived_parameters_propagate() {
        let model = ModelSpec::Bdr(BdrParams {
            phi1: 1.0,
            phi2: 1.2,
            thickness: 2.0,
        });
        let m = DMatrix::from_row_slice(3, 3, &[0.04, 0.01, 0.0, 0.01, 0.09, 0.0, 0.0, 0.0, 0.01]);
        let cov = CovarianceMatrix::from_matrix(&m);
        let est = parameter_estimates(&model, Some(&cov));
        assert_eq!(est.len(), 5);
        let delta = est.iter().find(|p| p.name == "delta_phi").unwrap();
        assert!(delta.derived);
        assert_relative_eq!(delta.value, 0.2, max_relative = 1e-12);
        assert_relative_eq!(delta.std_error.unwrap(), (0.04_f64 + 0.09 - 0.02).sqrt(), max_relative = 1e-12);
        let mean = est.iter().find(|p| p.name == "phi_mean").unwrap();
        assert_relative_eq!(mean.std_error.unwrap(), (0.25_f64 * 0.15).sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn simmons_estimates_without_covariance() {
        let model = ModelSpec::Simmons(SimmonsParams {
            barrier_height: 1.0,
            thickness: 1.5,
        });
        let est = parameter_estimates(&model, None);
        assert_eq!(est.len(), 2);
        assert_eq!(est[0].name, "phi_mean");
        assert_eq!(est[1].unit, "nm");
        assert!(est.iter().all(|p| p.std_error.is_none()));
    }
}

//! Least squares solvers.
//!
//! The initial-guess estimators repeatedly solve tiny regression problems of the form:
//!
//! ```text
//! minimize Σ (J_i - Σ_k c_k V_i^k)^2,   k = 1..degree
//! ```
//!
//! i.e. a polynomial through the origin (every J–V curve passes through (0, 0)).
//!
//! Implementation choices:
//! - SVD solve, so tall design matrices work and near-collinear columns degrade
//!   gracefully instead of panicking.
//! - Voltages are rescaled to [-1, 1] before building the Vandermonde columns and
//!   the coefficients are unscaled afterwards.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y ≈ c_1 x + c_2 x^2 + … + c_degree x^degree` (no constant term).
///
/// Returns `[c_1, …, c_degree]`, or `None` when there are fewer points than
/// coefficients or the solve fails.
pub fn fit_polynomial_through_origin(x: &[f64], y: &[f64], degree: usize) -> Option<Vec<f64>> {
    if degree == 0 || x.len() != y.len() || x.len() < degree {
        return None;
    }
    let x_scale = x.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if x_scale <= 0.0 {
        return None;
    }

    let n = x.len();
    let mut design = DMatrix::<f64>::zeros(n, degree);
    for (i, &xi) in x.iter().enumerate() {
        let t = xi / x_scale;
        let mut power = t;
        for k in 0..degree {
            design[(i, k)] = power;
            power *= t;
        }
    }
    let rhs = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design, &rhs)?;

    Some(
        beta.iter()
            .enumerate()
            .map(|(k, b)| b / x_scale.powi(k as i32 + 1))
            .collect(),
    )
}

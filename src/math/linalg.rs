//! Normal-equation helpers for the damped Gauss–Newton step.

use nalgebra::{DMatrix, DVector};

/// Form `JᵗWJ` and `JᵗWr` for row weights `w`.
pub fn weighted_normal_equations(
    jacobian: &DMatrix<f64>,
    residuals: &[f64],
    weights: &[f64],
) -> (DMatrix<f64>, DVector<f64>) {
    let p = jacobian.ncols();
    let mut jtj = DMatrix::<f64>::zeros(p, p);
    let mut jtr = DVector::<f64>::zeros(p);
    for (i, (&r, &w)) in residuals.iter().zip(weights).enumerate() {
        if w == 0.0 {
            continue;
        }
        for a in 0..p {
            let ja = jacobian[(i, a)];
            jtr[a] += w * ja * r;
            for b in a..p {
                jtj[(a, b)] += w * ja * jacobian[(i, b)];
            }
        }
    }
    for a in 0..p {
        for b in 0..a {
            jtj[(a, b)] = jtj[(b, a)];
        }
    }
    (jtj, jtr)
}

/// Solve `(A + λI) δ = g` by Cholesky. `None` when the damped matrix is not positive definite.
pub fn solve_damped(a: &DMatrix<f64>, g: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let mut damped = a.clone();
    for i in 0..damped.nrows() {
        damped[(i, i)] += lambda;
    }
    let delta = damped.cholesky()?.solve(g);
    delta.iter().all(|v| v.is_finite()).then_some(delta)
}

/// Euclidean norm of a slice.
pub fn norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_equations_match_explicit_product() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let r = [1.0, -1.0, 2.0];
        let w = [1.0, 0.5, 0.0];
        let (jtj, jtr) = weighted_normal_equations(&j, &r, &w);
        assert!((jtj[(0, 0)] - 5.5).abs() < 1e-12);
        assert!((jtj[(0, 1)] - 8.0).abs() < 1e-12);
        assert!((jtj[(1, 0)] - 8.0).abs() < 1e-12);
        assert!((jtj[(1, 1)] - 12.0).abs() < 1e-12);
        assert!((jtr[0] + 0.5).abs() < 1e-12);
        assert!((jtr[1] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn damping_makes_singular_system_solvable() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let g = DVector::from_row_slice(&[1.0, 1.0]);
        assert!(solve_damped(&a, &g, 0.0).is_none());
        let delta = solve_damped(&a, &g, 1e-3).unwrap();
        assert!((delta[0] - delta[1]).abs() < 1e-12);
    }

    #[test]
    fn norm_of_3_4() {
        assert_eq!(norm(&[3.0, 4.0]), 5.0);
    }
}

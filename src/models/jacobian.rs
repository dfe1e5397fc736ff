//! Finite-difference Jacobians.

use crate::models::PhysicalConstants;

/// Relative step for central differences.
pub const RELATIVE_STEP: f64 = 1e-6;
/// Floor on `|p|` when sizing the step, so parameters near zero still move.
const STEP_FLOOR: f64 = 1e-3;

/// Central-difference `∂f/∂p_k` at `(v, params)`, written into `out`.
///
/// Step per parameter: `h_k = 1e-6 · max(|p_k|, 1e-3)`.
pub fn central_difference_row(
    f: fn(f64, &[f64], &PhysicalConstants) -> f64,
    v: f64,
    params: &[f64],
    c: &PhysicalConstants,
    out: &mut [f64],
) {
    let mut shifted = params.to_vec();
    for k in 0..params.len() {
        let step = RELATIVE_STEP * params[k].abs().max(STEP_FLOOR);
        shifted[k] = params[k] + step;
        let up = f(v, &shifted, c);
        shifted[k] = params[k] - step;
        let down = f(v, &shifted, c);
        shifted[k] = params[k];
        out[k] = (up - down) / (2.0 * step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(v: f64, p: &[f64], _c: &PhysicalConstants) -> f64 {
        p[0] * v + p[1] * p[1] * v * v
    }

    #[test]
    fn central_difference_of_polynomial() {
        let c = PhysicalConstants::default();
        let mut out = [0.0; 2];
        central_difference_row(quadratic, 2.0, &[3.0, 0.5], &c, &mut out);
        assert!((out[0] - 2.0).abs() < 1e-8);
        assert!((out[1] - 4.0).abs() < 1e-6);
    }
}

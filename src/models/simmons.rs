//! Simmons rectangular-barrier model.
//!
//! ```text
//! J(V) = C1/d² · [ g(φ) − g(φ+V) ],   g(x) = x · exp(−C2·d·√x)
//! ```
//!
//! `g(x)` is taken as 0 for `x ≤ 0` (no barrier left to tunnel through), so
//! both bracket terms go through the same function and `J(0) = 0` exactly.

use crate::domain::{FitWarning, NormalizedDataset};
use crate::math::bisect;
use crate::models::PhysicalConstants;

/// `u` at which the conductance `c1(u) ∝ (u−2)e^{−u}/u²` peaks: (1+√17)/2.
const CONDUCTANCE_PEAK_U: f64 = 2.561_552_812_808_830_3;
/// `u` at which `(u−3)e^{−u}/u` peaks: (3+√21)/2.
const SERIES_PEAK_U: f64 = 3.791_287_847_477_92;
const MAX_U: f64 = 200.0;

fn g(x: f64, a: f64) -> f64 {
    if x > 0.0 { x * (-a * x.sqrt()).exp() } else { 0.0 }
}

/// dg/dx.
fn g_prime(x: f64, a: f64) -> f64 {
    if x > 0.0 {
        let u = a * x.sqrt();
        (-u).exp() * (1.0 - 0.5 * u)
    } else {
        0.0
    }
}

/// −dg/da = x^{3/2} · exp(−a√x).
fn h(x: f64, a: f64) -> f64 {
    if x > 0.0 {
        let s = x.sqrt();
        x * s * (-a * s).exp()
    } else {
        0.0
    }
}

/// Current density (A/m²) at bias `v` for barrier height `phi` (eV) and thickness `d` (nm).
pub fn current_density(v: f64, phi: f64, d: f64, c: &PhysicalConstants) -> f64 {
    let a = c.c2 * d;
    c.c1 / (d * d) * (g(phi, a) - g(phi + v, a))
}

/// `params = [φ̄, d]`.
pub fn predict(v: f64, params: &[f64], c: &PhysicalConstants) -> f64 {
    current_density(v, params[0], params[1], c)
}

/// Analytic `[∂J/∂φ̄, ∂J/∂d]`.
pub fn jacobian_row(v: f64, params: &[f64], c: &PhysicalConstants, out: &mut [f64]) {
    let (phi, d) = (params[0], params[1]);
    let a = c.c2 * d;
    let k = c.c1 / (d * d);
    let j = k * (g(phi, a) - g(phi + v, a));
    out[0] = k * (g_prime(phi, a) - g_prime(phi + v, a));
    out[1] = -2.0 * j / d + k * c.c2 * (h(phi + v, a) - h(phi, a));
}

/// Whether the second bracket term is clamped at this bias.
pub fn is_clamped(v: f64, phi: f64) -> bool {
    phi + v <= 0.0
}

/// Count of clamped points, reported as a warning when nonzero.
pub fn diagnostics(data: &NormalizedDataset, params: &[f64]) -> Vec<FitWarning> {
    let points = data
        .voltages()
        .iter()
        .filter(|&&v| is_clamped(v, params[0]))
        .count();
    if points > 0 {
        vec![FitWarning::BarrierClamped { points }]
    } else {
        Vec::new()
    }
}

/// Low-bias expansion `J ≈ c1·V + c2·V²` at `(φ, d)`.
pub fn series_coefficients(phi: f64, d: f64, c: &PhysicalConstants) -> (f64, f64) {
    let u = c.c2 * d * phi.sqrt();
    let k = c.c1 / (d * d) * (-u).exp();
    let c1 = k * (0.5 * u - 1.0);
    let c2 = k * u * (3.0 - u) / (8.0 * phi);
    (c1, c2)
}

/// Invert the low-bias coefficients for `(φ, d)`.
///
/// With `u = C2·d·√φ` and `r = c2/c1`, the curvature ratio gives
/// `φ = u(3−u) / (4r(u−2))` and the conductance reduces to
/// `c1 = C1·C2²·(3−u)·e^{−u} / (8ru)`, solved on the decreasing branch `u > 3.79`.
/// Only the `r < 0` (thick barrier) branch is inverted.
pub fn invert_series(c1: f64, c2: f64, c: &PhysicalConstants) -> Option<(f64, f64)> {
    if !(c1 > 0.0 && c2 < 0.0 && c1.is_finite() && c2.is_finite()) {
        return None;
    }
    let r = c2 / c1;
    let ln_c1 = c1.ln();
    let ln_k = (c.c1 * c.c2 * c.c2 / (8.0 * -r)).ln();
    let residual = |u: f64| ln_k + ((u - 3.0) / u).ln() - u - ln_c1;

    let u = bisect(residual, SERIES_PEAK_U, MAX_U, 1e-12, 200)?;
    let phi = u * (3.0 - u) / (4.0 * r * (u - 2.0));
    if !(phi.is_finite() && phi > 0.0) {
        return None;
    }
    let d = u / (c.c2 * phi.sqrt());
    (d.is_finite() && d > 0.0).then_some((phi, d))
}

/// Thickness that reproduces the linear conductance `c1` at a fixed `phi`.
///
/// Searches the decreasing branch of `c1(d)`, up to `d_max` nm.
pub fn thickness_from_conductance(
    c1: f64,
    phi: f64,
    d_max: f64,
    c: &PhysicalConstants,
) -> Option<f64> {
    if !(c1 > 0.0 && phi > 0.0 && c1.is_finite()) {
        return None;
    }
    let scale = c.c2 * phi.sqrt();
    let u_max = (d_max * scale).min(MAX_U);
    if u_max <= CONDUCTANCE_PEAK_U {
        return None;
    }
    // c1(u) = C1·C2²·φ·e^{−u}(u/2 − 1)/u²
    let ln_k = (c.c1 * c.c2 * c.c2 * phi).ln();
    let ln_c1 = c1.ln();
    let residual = |u: f64| ln_k + (0.5 * u - 1.0).ln() - u - 2.0 * u.ln() - ln_c1;

    let u = bisect(residual, CONDUCTANCE_PEAK_U, u_max, 1e-12, 200)?;
    let d = u / scale;
    (d.is_finite() && d > 0.0).then_some(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::central_difference_row;
    use approx::assert_relative_eq;

    fn constants() -> PhysicalConstants {
        PhysicalConstants::default()
    }

    #[test]
    fn zero_bias_is_exactly_zero() {
        let c = constants();
        for &(phi, d) in &[(0.2, 0.5), (1.0, 1.5), (4.0, 3.0)] {
            assert_eq!(current_density(0.0, phi, d, &c), 0.0);
        }
    }

    #[test]
    fn magnitude_at_reference_point() {
        let c = constants();
        let j = current_density(0.5, 1.0, 1.5, &c);
        assert!(j > 0.0);
        assert_relative_eq!(j, 5.5e5, max_relative = 0.05);
        assert!(current_density(-0.5, 1.0, 1.5, &c) < 0.0);
    }

    #[test]
    fn clamped_term_vanishes() {
        let c = constants();
        let j = current_density(-1.2, 1.0, 1.5, &c);
        let expected = c.c1 / (1.5 * 1.5) * g(1.0, c.c2 * 1.5);
        assert_relative_eq!(j, expected, max_relative = 1e-12);
        assert!(is_clamped(-1.2, 1.0));
        assert!(!is_clamped(-0.5, 1.0));
    }

    #[test]
    fn analytic_jacobian_matches_finite_difference() {
        let c = constants();
        let params = [1.0, 1.5];
        for &v in &[-0.4, -0.1, 0.05, 0.3, 0.5] {
            let mut analytic = [0.0; 2];
            let mut numeric = [0.0; 2];
            jacobian_row(v, &params, &c, &mut analytic);
            central_difference_row(predict, v, &params, &c, &mut numeric);
            for k in 0..2 {
                assert_relative_eq!(analytic[k], numeric[k], max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn series_inversion_round_trips() {
        let c = constants();
        let (c1, c2) = series_coefficients(1.0, 1.5, &c);
        assert!(c1 > 0.0 && c2 < 0.0);
        let (phi, d) = invert_series(c1, c2, &c).unwrap();
        assert_relative_eq!(phi, 1.0, max_relative = 1e-8);
        assert_relative_eq!(d, 1.5, max_relative = 1e-8);
    }

    #[test]
    fn conductance_inversion_recovers_thickness() {
        let c = constants();
        let (c1, _) = series_coefficients(2.0, 1.2, &c);
        let d = thickness_from_conductance(c1, 2.0, 20.0, &c).unwrap();
        assert_relative_eq!(d, 1.2, max_relative = 1e-8);
    }

    #[test]
    fn clamp_diagnostics_count_points() {
        let data =
            NormalizedDataset::from_density(vec![-1.5, -0.5, 0.5], vec![-1.0, -0.5, 0.5], None)
                .unwrap();
        let warnings = diagnostics(&data, &[1.0, 1.5]);
        assert_eq!(warnings, vec![FitWarning::BarrierClamped { points: 1 }]);
        assert!(diagnostics(&data, &[2.0, 1.5]).is_empty());
    }
}

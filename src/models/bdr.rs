//! Brinkman–Dynes–Rowell (BDR) trapezoidal-barrier model.
//!
//! The BDR conductance expansion integrated once over bias:
//!
//! ```text
//! J(V) = G0·V·[ 1 − (A·d·Δφ / (16·φ̄^{3/2}))·V + (B·d²/φ̄)·V² ]
//! G0   = (C1·C2/2) · √φ̄/d · exp(−C2·d·√φ̄)
//! ```
//!
//! with `φ̄ = (φ1+φ2)/2`, `Δφ = φ2 − φ1`. Valid for `|eV| ≪ φ̄`.

use crate::domain::{FitWarning, NormalizedDataset};
use crate::models::{PhysicalConstants, central_difference_row};

/// Zero-bias conductance `G0` (A/(m²·V)).
pub fn zero_bias_conductance(mean_height: f64, d: f64, c: &PhysicalConstants) -> f64 {
    let s = mean_height.sqrt();
    0.5 * c.c1 * c.c2 * s / d * (-c.c2 * d * s).exp()
}

/// Polynomial coefficients `[c1, c2, c3]` of `J = c1 V + c2 V² + c3 V³`.
pub fn polynomial_coefficients(phi1: f64, phi2: f64, d: f64, c: &PhysicalConstants) -> [f64; 3] {
    let mean = 0.5 * (phi1 + phi2);
    let delta = phi2 - phi1;
    let g0 = zero_bias_conductance(mean, d, c);
    [
        g0,
        -g0 * c.a() * d * delta / (16.0 * mean.powf(1.5)),
        g0 * c.b() * d * d / mean,
    ]
}

/// `params = [φ1, φ2, d]`.
pub fn predict(v: f64, params: &[f64], c: &PhysicalConstants) -> f64 {
    let [c1, c2, c3] = polynomial_coefficients(params[0], params[1], params[2], c);
    v * (c1 + v * (c2 + v * c3))
}

pub fn jacobian_row(v: f64, params: &[f64], c: &PhysicalConstants, out: &mut [f64]) {
    central_difference_row(predict, v, params, c, out);
}

/// Flags bias ranges beyond `φ̄/2`.
pub fn diagnostics(data: &NormalizedDataset, params: &[f64]) -> Vec<FitWarning> {
    let mean_height = 0.5 * (params[0] + params[1]);
    let max_bias = data.max_abs_voltage();
    if max_bias > 0.5 * mean_height {
        vec![FitWarning::BiasBeyondSeriesValidity {
            max_bias,
            mean_height,
        }]
    } else {
        Vec::new()
    }
}

/// Closed-form back-solve of `(φ1, φ2, d)` from cubic coefficients.
///
/// `b = c3/c1` fixes `d² = b·φ̄/B`; then `G0 = c1` closes `φ̄`; `Δφ` comes from
/// `a = −c2/c1`. Returns `None` if any step leaves the physical domain.
pub fn invert_polynomial(coeffs: [f64; 3], c: &PhysicalConstants) -> Option<[f64; 3]> {
    let [c1, c2, c3] = coeffs;
    if !(c1 > 0.0 && c3 > 0.0 && c2.is_finite()) {
        return None;
    }
    let a = -c2 / c1;
    let b = c3 / c1;
    let s = (b / c.b()).sqrt();
    let mean = -(c1 * s / (0.5 * c.c1 * c.c2)).ln() / (c.c2 * s);
    if !(mean.is_finite() && mean > 0.0) {
        return None;
    }
    let d = (b * mean / c.b()).sqrt();
    let delta = 16.0 * a * mean.powf(1.5) / (c.a() * d);
    let phi1 = mean - 0.5 * delta;
    let phi2 = mean + 0.5 * delta;
    let out = [phi1, phi2, d];
    out.iter().all(|v| v.is_finite() && *v > 0.0).then_some(out)
}

/// Thickness reproducing `G0 = c1` for a symmetric barrier of height `mean`.
///
/// `G0(d)` is strictly decreasing in `d`, so plain bisection suffices.
pub fn thickness_from_conductance(
    c1: f64,
    mean: f64,
    d_min: f64,
    d_max: f64,
    c: &PhysicalConstants,
) -> Option<f64> {
    if !(c1 > 0.0 && mean > 0.0) {
        return None;
    }
    let ln_c1 = c1.ln();
    let residual = |d: f64| zero_bias_conductance(mean, d, c).ln() - ln_c1;
    crate::math::bisect(residual, d_min, d_max, 1e-12, 200)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_bias_is_exactly_zero() {
        let c = PhysicalConstants::default();
        assert_eq!(predict(0.0, &[1.0, 1.2, 2.0], &c), 0.0);
        assert_eq!(predict(0.0, &[3.0, 0.5, 0.8], &c), 0.0);
    }

    #[test]
    fn asymmetry_tilts_the_curve() {
        let c = PhysicalConstants::default();
        let sym = [1.1, 1.1, 2.0];
        assert_relative_eq!(predict(0.3, &sym, &c), -predict(-0.3, &sym, &c), max_relative = 1e-12);
        let asym = [1.0, 1.2, 2.0];
        assert!(predict(0.3, &asym, &c) < -predict(-0.3, &asym, &c));
    }

    #[test]
    fn polynomial_inversion_round_trips() {
        let c = PhysicalConstants::default();
        let coeffs = polynomial_coefficients(1.0, 1.2, 2.0, &c);
        let [phi1, phi2, d] = invert_polynomial(coeffs, &c).unwrap();
        assert_relative_eq!(phi1, 1.0, max_relative = 1e-9);
        assert_relative_eq!(phi2, 1.2, max_relative = 1e-9);
        assert_relative_eq!(d, 2.0, max_relative = 1e-9);
    }

    #[test]
    fn conductance_inversion() {
        let c = PhysicalConstants::default();
        let g0 = zero_bias_conductance(1.5, 1.7, &c);
        let d = thickness_from_conductance(g0, 1.5, 0.05, 20.0, &c).unwrap();
        assert_relative_eq!(d, 1.7, max_relative = 1e-8);
    }

    #[test]
    fn validity_warning_beyond_half_height() {
        let data = NormalizedDataset::from_density(vec![-0.6, 0.6], vec![-1.0, 1.0], None).unwrap();
        assert_eq!(diagnostics(&data, &[1.0, 1.2, 2.0]).len(), 1);
        assert!(diagnostics(&data, &[2.0, 2.0, 2.0]).is_empty());
    }
}

//! Robust loss functions for IRLS.
//!
//! All functions take standardized residuals `u = r / s`. Weights feed the shared
//! damped solver; `rho` feeds the cost that decides step acceptance.

use crate::domain::LossKind;

/// Consistency constant: MAD / 0.6745 estimates σ for Gaussian residuals.
pub const MAD_CONSISTENCY: f64 = 0.6745;

/// IRLS weight `w(u)`.
pub fn weight(loss: LossKind, u: f64, k: f64) -> f64 {
    let au = u.abs();
    match loss {
        LossKind::L2 => 1.0,
        LossKind::Huber => {
            if au <= k {
                1.0
            } else {
                k / au
            }
        }
        LossKind::Tukey => {
            if au <= k {
                let t = 1.0 - (u / k) * (u / k);
                t * t
            } else {
                0.0
            }
        }
    }
}

/// Loss `ρ(u)` with `ρ(u) ≈ u²/2` near zero.
pub fn rho(loss: LossKind, u: f64, k: f64) -> f64 {
    let au = u.abs();
    match loss {
        LossKind::L2 => 0.5 * u * u,
        LossKind::Huber => {
            if au <= k {
                0.5 * u * u
            } else {
                k * (au - 0.5 * k)
            }
        }
        LossKind::Tukey => {
            let c = k * k / 6.0;
            if au <= k {
                let t = 1.0 - (u / k) * (u / k);
                c * (1.0 - t * t * t)
            } else {
                c
            }
        }
    }
}

/// Weights for every residual at scale `scale`.
///
/// Falls back to unit weights (second tuple element `true`) when fewer than
/// `min_positive` points keep a positive weight.
pub fn weights(
    loss: LossKind,
    residuals: &[f64],
    scale: f64,
    k: f64,
    min_positive: usize,
) -> (Vec<f64>, bool) {
    let w: Vec<f64> = residuals
        .iter()
        .map(|&r| weight(loss, r / scale, k))
        .collect();
    if w.iter().filter(|&&x| x > 0.0).count() < min_positive {
        (vec![1.0; residuals.len()], true)
    } else {
        (w, false)
    }
}

/// Total cost `Σ s²·ρ(r/s)`. Equals `½·SSE` under L2.
pub fn total_cost(loss: LossKind, residuals: &[f64], scale: f64, k: f64) -> f64 {
    let s2 = scale * scale;
    residuals
        .iter()
        .map(|&r| s2 * rho(loss, r / scale, k))
        .sum()
}

/// Robust scale `MAD / 0.6745`, floored at `floor`.
pub fn mad_scale(residuals: &[f64], floor: f64) -> f64 {
    let mut abs: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|v| v.is_finite())
        .collect();
    let mad = median_mut(&mut abs).unwrap_or(0.0);
    (mad / MAD_CONSISTENCY).max(floor)
}

fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn huber_weights() {
        assert_eq!(weight(LossKind::Huber, 0.5, 1.345), 1.0);
        assert!((weight(LossKind::Huber, -2.69, 1.345) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tukey_rejects_beyond_threshold() {
        assert_eq!(weight(LossKind::Tukey, 5.0, 4.685), 0.0);
        assert_eq!(weight(LossKind::Tukey, 0.0, 4.685), 1.0);
        let w = weight(LossKind::Tukey, 2.0, 4.0);
        assert!((w - 0.5625).abs() < 1e-12);
    }

    #[test]
    fn rho_is_continuous_at_threshold() {
        for loss in [LossKind::Huber, LossKind::Tukey] {
            let k = loss.default_threshold();
            let inside = rho(loss, k - 1e-9, k);
            let outside = rho(loss, k + 1e-9, k);
            assert!((inside - outside).abs() < 1e-6);
        }
        assert_eq!(rho(LossKind::L2, 3.0, f64::INFINITY), 4.5);
    }

    #[test]
    fn mad_scale_of_symmetric_residuals() {
        let r = [-2.0, -1.0, 0.0, 1.0, 2.0];
        assert!((mad_scale(&r, 1e-12) - 1.0 / MAD_CONSISTENCY).abs() < 1e-12);
        assert_eq!(mad_scale(&[0.0, 0.0], 1e-9), 1e-9);
    }

    #[test]
    fn collapsed_weights_fall_back_to_unit() {
        let r = [10.0, 10.0, 0.1];
        let (w, collapsed) = weights(LossKind::Tukey, &r, 1.0, 4.685, 2);
        assert!(collapsed);
        assert_eq!(w, vec![1.0; 3]);
        let (w, collapsed) = weights(LossKind::Tukey, &r, 1.0, 4.685, 1);
        assert!(!collapsed);
        assert_eq!(w[0], 0.0);
    }

    #[test]
    fn l2_cost_is_half_sse() {
        let r = [1.0, -2.0, 3.0];
        assert!((total_cost(LossKind::L2, &r, 0.7, f64::INFINITY) - 7.0).abs() < 1e-12);
    }
}

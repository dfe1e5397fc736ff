//! Closed-form initial guesses from the low-bias series.
//!
//! Each model produces a short, ordered list of candidate parameter vectors:
//!
//! - series inversions of polynomial fits through the origin
//! - conductance-only inversions on a small ladder of barrier heights
//! - a fixed fallback
//!
//! Candidates are projected into the model's default bounds and scored by SSE
//! against the data (in parallel). The lowest SSE wins; ties go to the earliest
//! candidate, so the choice is deterministic.

use rayon::prelude::*;

use crate::domain::{ModelKind, ModelSpec, NormalizedDataset};
use crate::math::{fit_polynomial_through_origin, log_grid};
use crate::models::{PhysicalConstants, bdr, simmons};

/// Barrier heights (eV) tried when only the conductance is trusted.
const LADDER_MIN_EV: f64 = 0.25;
const LADDER_MAX_EV: f64 = 8.0;
const LADDER_STEPS: usize = 6;
/// Fraction of max|V| treated as "low bias".
const LOW_BIAS_FRACTION: f64 = 0.5;
const SIMMONS_DEGREE: usize = 5;
const BDR_DEGREE: usize = 3;

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    params: Vec<f64>,
    sse: f64,
}

/// Initial guess with CODATA constants.
pub fn initial_guess(kind: ModelKind, data: &NormalizedDataset) -> ModelSpec {
    initial_guess_with(kind, data, &PhysicalConstants::default())
}

/// Initial guess for `kind` from `data`, always inside the default bounds.
pub fn initial_guess_with(
    kind: ModelKind,
    data: &NormalizedDataset,
    c: &PhysicalConstants,
) -> ModelSpec {
    let raw = match kind {
        ModelKind::Simmons => simmons_candidates(data, c),
        ModelKind::Bdr => bdr_candidates(data, c),
    };
    let bounds = kind.default_bounds();
    let ops = kind.ops();

    let scored: Vec<Candidate> = raw
        .par_iter()
        .enumerate()
        .filter_map(|(idx, params)| {
            if params.len() != kind.param_count() || params.iter().any(|v| !v.is_finite()) {
                return None;
            }
            let params = bounds.project(params);
            let sse: f64 = data
                .points()
                .map(|(v, j)| {
                    let r = j - (ops.predict)(v, &params, c);
                    r * r
                })
                .sum();
            sse.is_finite().then_some(Candidate { idx, params, sse })
        })
        .collect();

    let best = scored.iter().fold(None::<&Candidate>, |best, cand| match best {
        Some(b) if !(cand.sse < b.sse || (cand.sse == b.sse && cand.idx < b.idx)) => Some(b),
        _ => Some(cand),
    });

    let params = match best {
        Some(b) => b.params.clone(),
        None => bounds.project(&fallback(kind)),
    };
    tracing::debug!(model = %kind, ?params, candidates = scored.len(), "initial guess");
    ModelSpec::from_values_unchecked(kind, &params)
}

fn fallback(kind: ModelKind) -> Vec<f64> {
    match kind {
        ModelKind::Simmons => vec![1.0, 1.0],
        ModelKind::Bdr => vec![1.0, 1.0, 1.0],
    }
}

/// Points with |V| ≤ 0.5·max|V|.
fn low_bias_window(data: &NormalizedDataset) -> (Vec<f64>, Vec<f64>) {
    let limit = LOW_BIAS_FRACTION * data.max_abs_voltage();
    data.points().filter(|(v, _)| v.abs() <= limit).unzip()
}

fn polynomial_fit(v: &[f64], j: &[f64], max_degree: usize) -> Option<Vec<f64>> {
    let degree = max_degree.min(v.len());
    fit_polynomial_through_origin(v, j, degree)
}

fn simmons_candidates(data: &NormalizedDataset, c: &PhysicalConstants) -> Vec<Vec<f64>> {
    let (wv, wj) = low_bias_window(data);
    let fits = [
        polynomial_fit(&wv, &wj, SIMMONS_DEGREE),
        polynomial_fit(data.voltages(), data.current_density(), SIMMONS_DEGREE),
    ];

    let mut out = Vec::new();
    for coeffs in fits.iter().flatten() {
        if coeffs.len() >= 2 {
            if let Some((phi, d)) = simmons::invert_series(coeffs[0], coeffs[1], c) {
                out.push(vec![phi, d]);
            }
        }
    }

    if let Some(c1) = fits.iter().flatten().map(|f| f[0]).find(|g| *g > 0.0) {
        let d_max = ModelKind::Simmons.default_bounds().upper[1];
        for phi in log_grid(LADDER_MIN_EV, LADDER_MAX_EV, LADDER_STEPS) {
            if let Some(d) = simmons::thickness_from_conductance(c1, phi, d_max, c) {
                out.push(vec![phi, d]);
            }
        }
    }

    out.push(fallback(ModelKind::Simmons));
    out
}

fn bdr_candidates(data: &NormalizedDataset, c: &PhysicalConstants) -> Vec<Vec<f64>> {
    let (wv, wj) = low_bias_window(data);
    let fits = [
        polynomial_fit(data.voltages(), data.current_density(), BDR_DEGREE),
        polynomial_fit(&wv, &wj, BDR_DEGREE),
    ];

    let mut out = Vec::new();
    for coeffs in fits.iter().flatten() {
        if let [c1, c2, c3] = coeffs[..] {
            if let Some(p) = bdr::invert_polynomial([c1, c2, c3], c) {
                out.push(p.to_vec());
            }
        }
    }

    if let Some(c1) = fits.iter().flatten().map(|f| f[0]).find(|g| *g > 0.0) {
        let bounds = ModelKind::Bdr.default_bounds();
        for mean in log_grid(LADDER_MIN_EV, LADDER_MAX_EV, LADDER_STEPS) {
            if let Some(d) =
                bdr::thickness_from_conductance(c1, mean, bounds.lower[2], bounds.upper[2], c)
            {
                out.push(vec![mean, mean, d]);
            }
        }
    }

    out.push(fallback(ModelKind::Bdr));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sweep(kind: ModelKind, params: &[f64]) -> NormalizedDataset {
        let c = PhysicalConstants::default();
        let v: Vec<f64> = (0..=100).map(|i| -0.5 + i as f64 * 0.01).collect();
        let j: Vec<f64> = v.iter().map(|&x| (kind.ops().predict)(x, params, &c)).collect();
        NormalizedDataset::from_density(v, j, None).unwrap()
    }

    #[test]
    fn bdr_guess_is_exact_on_noiseless_data() {
        let data = sweep(ModelKind::Bdr, &[1.0, 1.2, 2.0]);
        let guess = initial_guess(ModelKind::Bdr, &data).values();
        assert_relative_eq!(guess[0], 1.0, max_relative = 1e-6);
        assert_relative_eq!(guess[1], 1.2, max_relative = 1e-6);
        assert_relative_eq!(guess[2], 2.0, max_relative = 1e-6);
    }

    #[test]
    fn simmons_guess_is_close_on_noiseless_data() {
        let data = sweep(ModelKind::Simmons, &[1.0, 1.5]);
        let guess = initial_guess(ModelKind::Simmons, &data).values();
        assert!((guess[0] - 1.0).abs() < 0.5, "phi guess {guess:?}");
        assert!((guess[1] - 1.5).abs() < 0.5, "d guess {guess:?}");
    }

    #[test]
    fn guess_lies_inside_default_bounds() {
        // Flat zero data gives no usable conductance; the fallback must still be valid.
        let v: Vec<f64> = (1..=10).map(|i| i as f64 * 0.05).collect();
        let data = NormalizedDataset::from_density(v, vec![0.0; 10], None).unwrap();
        for kind in ModelKind::ALL {
            let guess = initial_guess(kind, &data).values();
            assert!(kind.default_bounds().contains(&guess));
        }
    }
}

//! Synthetic J–V sweeps for demos and tests.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{ModelSpec, NormalizedDataset};
use crate::error::FitError;
use crate::models::PhysicalConstants;

/// Description of a synthetic voltage sweep.
#[derive(Debug, Clone)]
pub struct SweepSpec {
    pub model: ModelSpec,
    pub v_min: f64,
    pub v_max: f64,
    pub points: usize,
    /// Gaussian noise standard deviation as a fraction of max|J| over the sweep.
    pub noise: f64,
    pub seed: u64,
    /// Multiply the point at this index by the given factor after noise.
    pub outlier: Option<(usize, f64)>,
    pub temperature: Option<f64>,
    pub constants: PhysicalConstants,
}

impl SweepSpec {
    /// Evenly spaced sweep with no noise and no outlier.
    pub fn new(model: ModelSpec, v_min: f64, v_max: f64, points: usize) -> Self {
        Self {
            model,
            v_min,
            v_max,
            points,
            noise: 0.0,
            seed: 0,
            outlier: None,
            temperature: None,
            constants: PhysicalConstants::default(),
        }
    }
}

/// Evenly spaced voltages from `v_min` to `v_max` inclusive.
pub fn voltage_grid(v_min: f64, v_max: f64, points: usize) -> Vec<f64> {
    if points == 1 {
        return vec![v_min];
    }
    let step = (v_max - v_min) / (points - 1) as f64;
    (0..points).map(|i| v_min + step * i as f64).collect()
}

/// Generate a (deterministic for a given seed) noisy sweep of the model.
pub fn generate_sweep(spec: &SweepSpec) -> Result<NormalizedDataset, FitError> {
    if spec.points == 0 {
        return Err(FitError::InvalidConfig("Sweep needs at least one point".into()));
    }
    if !(spec.v_min.is_finite() && spec.v_max.is_finite() && spec.v_max >= spec.v_min) {
        return Err(FitError::InvalidConfig(format!(
            "Invalid voltage range [{}, {}]",
            spec.v_min, spec.v_max
        )));
    }
    if !(spec.noise.is_finite() && spec.noise >= 0.0) {
        return Err(FitError::InvalidConfig(format!(
            "Noise level must be finite and >= 0, got {}",
            spec.noise
        )));
    }
    if let Some((idx, _)) = spec.outlier {
        if idx >= spec.points {
            return Err(FitError::InvalidConfig(format!(
                "Outlier index {idx} is outside the sweep (0..{})",
                spec.points
            )));
        }
    }
    ModelSpec::from_values(spec.model.kind(), &spec.model.values())?;

    let voltages = voltage_grid(spec.v_min, spec.v_max, spec.points);
    let clean: Vec<f64> = voltages
        .iter()
        .map(|&v| spec.model.predict(v, &spec.constants))
        .collect();
    let sigma = spec.noise * clean.iter().fold(0.0_f64, |m, j| m.max(j.abs()));

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| FitError::InvalidConfig(format!("Noise distribution error: {e}")))?;

    let mut density: Vec<f64> = clean
        .iter()
        .map(|&j| j + sigma * normal.sample(&mut rng))
        .collect();
    if let Some((idx, factor)) = spec.outlier {
        density[idx] *= factor;
    }

    NormalizedDataset::from_density(voltages, density, spec.temperature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SimmonsParams;

    fn spec() -> SweepSpec {
        let model = ModelSpec::Simmons(SimmonsParams {
            barrier_height: 1.0,
            thickness: 1.5,
        });
        SweepSpec {
            noise: 0.01,
            seed: 7,
            ..SweepSpec::new(model, -0.5, 0.5, 101)
        }
    }

    #[test]
    fn grid_is_inclusive() {
        let v = voltage_grid(-0.5, 0.5, 101);
        assert_eq!(v.len(), 101);
        assert!((v[0] + 0.5).abs() < 1e-15);
        assert!((v[100] - 0.5).abs() < 1e-12);
        assert!(v[50].abs() < 1e-12);
    }

    #[test]
    fn same_seed_same_data() {
        let a = generate_sweep(&spec()).unwrap();
        let b = generate_sweep(&spec()).unwrap();
        assert_eq!(a, b);
        let other = generate_sweep(&SweepSpec { seed: 8, ..spec() }).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn outlier_is_applied() {
        let clean = generate_sweep(&SweepSpec { noise: 0.0, ..spec() }).unwrap();
        let dirty = generate_sweep(&SweepSpec {
            noise: 0.0,
            outlier: Some((80, 100.0)),
            ..spec()
        })
        .unwrap();
        let ratio = dirty.current_density()[80] / clean.current_density()[80];
        assert!((ratio - 100.0).abs() < 1e-9);
        assert!(generate_sweep(&SweepSpec { outlier: Some((101, 2.0)), ..spec() }).is_err());
    }
}

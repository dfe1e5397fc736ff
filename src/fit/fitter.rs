//! Levenberg–Marquardt fitting for a single dataset and model.
//!
//! Given:
//! - bias points `V_i` and observed densities `J_i`
//! - a model kind (through its [`ModelOps`] table)
//! - a loss (L2, Huber, Tukey)
//!
//! we iterate damped Gauss–Newton steps on the residuals `r = J_obs − J_pred`:
//!
//! ```text
//! (JᵗWJ + λI) δ = JᵗWr,   p ← Π_box(p + δ)
//! ```
//!
//! where `W` holds the IRLS weights (identity for L2) and `Π_box` clips into the
//! parameter bounds. A step is kept when the robust cost `Σ s²ρ(r/s)` does not
//! increase; λ then shrinks, otherwise λ grows.
//!
//! Residuals and the Jacobian are divided by max|J_obs| internally so λ is
//! commensurate with `JᵗJ` whatever the current scale of the device. Everything
//! reported on the [`FitResult`] is back in A/m².

use std::time::Instant;

use nalgebra::DMatrix;

use crate::domain::{
    ConvergedState, ConvergenceStatus, FitConfig, FitQuality, FitResult, FitWarning,
    InitialGuess, ModelKind, ModelSpec, NormalizedDataset, ParamBounds,
};
use crate::error::FitError;
use crate::fit::{estimate_covariance, mad_scale, parameter_estimates, robust};
use crate::math::{norm, solve_damped, weighted_normal_equations};
use crate::models::{ModelOps, PhysicalConstants};

const MIN_LAMBDA: f64 = 1e-12;
const MAX_LAMBDA: f64 = 1e12;
/// Cost (in scaled units) treated as an exact fit.
const EXACT_FIT_COST: f64 = 1e-28;
/// Floor on the MAD scale (scaled units) so an exact fit does not divide by zero.
const MIN_ROBUST_SCALE: f64 = 1e-9;

/// Iteration state, owned by a single `fit` call.
struct LmState {
    params: Vec<f64>,
    /// Scaled residuals `(J_obs − J_pred) / y_scale`.
    residuals: Vec<f64>,
    lambda: f64,
    escalations: usize,
    iterations: usize,
    collapsed_iterations: usize,
}

/// Immutable inputs shared by every iteration.
struct Problem<'a> {
    ops: &'static ModelOps,
    voltages: &'a [f64],
    /// Observed densities divided by `y_scale`.
    observed: Vec<f64>,
    y_scale: f64,
    constants: &'a PhysicalConstants,
    bounds: ParamBounds,
}

impl Problem<'_> {
    /// Scaled residuals at `params`, or `None` if any prediction is non-finite.
    fn residuals(&self, params: &[f64]) -> Option<Vec<f64>> {
        self.voltages
            .iter()
            .zip(&self.observed)
            .map(|(&v, &y)| {
                let pred = (self.ops.predict)(v, params, self.constants);
                pred.is_finite().then(|| y - pred / self.y_scale)
            })
            .collect()
    }

    /// Jacobian of the prediction, in A/m² per parameter unit.
    fn jacobian(&self, params: &[f64]) -> DMatrix<f64> {
        let p = params.len();
        let mut jac = DMatrix::<f64>::zeros(self.voltages.len(), p);
        let mut row = vec![0.0; p];
        for (i, &v) in self.voltages.iter().enumerate() {
            (self.ops.jacobian_row)(v, params, self.constants, &mut row);
            for k in 0..p {
                jac[(i, k)] = row[k];
            }
        }
        jac
    }
}

/// Fit `model` to `data`.
///
/// The starting point comes from `config.initial_guess`: the values carried by
/// `model` (`FromModel`), the model library's closed-form guess (`Auto`), or an
/// explicit vector. It is projected into the bounds before the first step.
///
/// Structural problems (too few points, malformed configuration) are errors.
/// Numerical trouble is reported on the result: `status`, `warnings` and an
/// unavailable covariance.
pub fn fit(
    data: &NormalizedDataset,
    model: &ModelSpec,
    config: &FitConfig,
) -> Result<FitResult, FitError> {
    config.validate()?;
    let kind = model.kind();
    let ops = kind.ops();
    let p = kind.param_count();
    let n = data.len();
    if n < p {
        return Err(FitError::InvalidData(format!(
            "{} needs at least {p} points, got {n}",
            kind.display_name()
        )));
    }
    let bounds = config.bounds_for(kind)?;

    let start = match &config.initial_guess {
        InitialGuess::FromModel => ModelSpec::from_values(kind, &model.values())?.values(),
        InitialGuess::Auto => ops.initial_guess(data, &config.constants),
        InitialGuess::Explicit(values) => ModelSpec::from_values(kind, values)?.values(),
    };
    let start = bounds.project(&start);
    let initial = ModelSpec::from_values_unchecked(kind, &start);

    let max_abs = data.max_abs_density();
    let y_scale = if max_abs > 0.0 { max_abs } else { 1.0 };
    let problem = Problem {
        ops,
        voltages: data.voltages(),
        observed: data.current_density().iter().map(|j| j / y_scale).collect(),
        y_scale,
        constants: &config.constants,
        bounds,
    };

    let k = config.robust_threshold();
    let fixed_scale = config.robust_scale.map(|s| s / y_scale);
    let robust_scale = |residuals: &[f64]| -> f64 {
        if !config.loss.is_robust() {
            return 1.0;
        }
        fixed_scale.unwrap_or_else(|| mad_scale(residuals, MIN_ROBUST_SCALE))
    };

    let mut warnings = Vec::new();
    if data.duplicate_voltages() > 0 {
        warnings.push(FitWarning::DuplicateVoltages {
            count: data.duplicate_voltages(),
        });
    }

    let Some(residuals) = problem.residuals(&start) else {
        return Err(FitError::InvalidConfig(format!(
            "{} prediction is non-finite at the initial guess {start:?}",
            kind.display_name()
        )));
    };
    let mut state = LmState {
        params: start,
        residuals,
        lambda: config.initial_lambda,
        escalations: 0,
        iterations: 0,
        collapsed_iterations: 0,
    };

    let clock = Instant::now();
    let mut status = ConvergenceStatus::MaxIterations;

    for iter in 0..config.max_iterations {
        if let Some(budget) = config.max_wall_time {
            let elapsed = clock.elapsed();
            if elapsed >= budget {
                warnings.push(FitWarning::WallTimeExceeded {
                    elapsed_ms: elapsed.as_millis() as u64,
                });
                break;
            }
        }
        state.iterations = iter + 1;

        let scale = robust_scale(&state.residuals);
        let (weights, collapsed) = if config.loss.is_robust() {
            robust::weights(config.loss, &state.residuals, scale, k, p)
        } else {
            (vec![1.0; n], false)
        };
        if collapsed {
            state.collapsed_iterations += 1;
        }
        let cost = robust::total_cost(config.loss, &state.residuals, scale, k);

        let jac = problem.jacobian(&state.params) / y_scale;
        let (jtj, jtr) = weighted_normal_equations(&jac, &state.residuals, &weights);

        let Some(delta) = solve_damped(&jtj, &jtr, state.lambda) else {
            if escalate(&mut state, config) {
                status = ConvergenceStatus::Diverged;
                break;
            }
            continue;
        };

        let trial: Vec<f64> = state
            .params
            .iter()
            .zip(delta.iter())
            .map(|(p, d)| p + d)
            .collect();
        let trial = problem.bounds.project(&trial);
        let Some(trial_residuals) = problem.residuals(&trial) else {
            tracing::debug!(iteration = state.iterations, ?trial, "non-finite prediction");
            status = ConvergenceStatus::Diverged;
            break;
        };
        let trial_cost = robust::total_cost(config.loss, &trial_residuals, scale, k);

        let step: Vec<f64> = trial.iter().zip(&state.params).map(|(a, b)| a - b).collect();
        let rel_step = norm(&step) / (norm(&state.params) + f64::EPSILON);
        let rel_change = (cost - trial_cost).abs() / cost.max(f64::MIN_POSITIVE);

        tracing::debug!(
            iteration = state.iterations,
            cost,
            trial_cost,
            lambda = state.lambda,
            rel_step,
            "lm step"
        );

        if trial_cost <= cost {
            state.params = trial;
            state.residuals = trial_residuals;
            state.lambda = (state.lambda * config.lambda_down).max(MIN_LAMBDA);
            state.escalations = 0;
            if (rel_step <= config.x_tol && rel_change <= config.f_tol)
                || trial_cost <= EXACT_FIT_COST
            {
                status = ConvergenceStatus::Converged;
                break;
            }
        } else {
            // No representable improvement left around the current point.
            if rel_change <= config.f_tol {
                status = ConvergenceStatus::Converged;
                break;
            }
            if escalate(&mut state, config) {
                status = ConvergenceStatus::Diverged;
                break;
            }
        }
    }

    finish(data, kind, config, &problem, initial, state, status, warnings)
}

/// Fit with the model library's initial guess, ignoring any configured guess policy.
pub fn fit_auto(
    data: &NormalizedDataset,
    kind: ModelKind,
    config: &FitConfig,
) -> Result<FitResult, FitError> {
    let config = FitConfig {
        initial_guess: InitialGuess::Auto,
        ..config.clone()
    };
    let placeholder = ModelSpec::from_values_unchecked(kind, &kind.default_bounds().lower);
    fit(data, &placeholder, &config)
}

/// Raise λ after a rejected step. Returns `true` once the escalation limit is reached.
fn escalate(state: &mut LmState, config: &FitConfig) -> bool {
    state.lambda = (state.lambda * config.lambda_up).min(MAX_LAMBDA);
    state.escalations += 1;
    state.escalations >= config.max_lambda_escalations
}

#[allow(clippy::too_many_arguments)]
fn finish(
    data: &NormalizedDataset,
    kind: ModelKind,
    config: &FitConfig,
    problem: &Problem<'_>,
    initial: ModelSpec,
    state: LmState,
    status: ConvergenceStatus,
    mut warnings: Vec<FitWarning>,
) -> Result<FitResult, FitError> {
    let p = kind.param_count();
    let n = data.len();
    let y_scale = problem.y_scale;

    let weights = if config.loss.is_robust() {
        let scale = config
            .robust_scale
            .map(|s| s / y_scale)
            .unwrap_or_else(|| mad_scale(&state.residuals, MIN_ROBUST_SCALE));
        robust::weights(
            config.loss,
            &state.residuals,
            scale,
            config.robust_threshold(),
            p,
        )
        .0
    } else {
        vec![1.0; n]
    };

    let residuals: Vec<f64> = state.residuals.iter().map(|r| r * y_scale).collect();
    let fitted: Vec<f64> = data
        .current_density()
        .iter()
        .zip(&residuals)
        .map(|(j, r)| j - r)
        .collect();

    let converged = ConvergedState {
        kind,
        params: state.params.clone(),
        jacobian: problem.jacobian(&state.params),
        residuals: residuals.clone(),
        weights: weights.clone(),
    };
    let covariance = estimate_covariance(&converged);
    match &covariance {
        Err(FitError::SingularJacobian) => warnings.push(FitWarning::SingularJacobian),
        Err(FitError::InsufficientData { n_points, n_params }) => {
            warnings.push(FitWarning::InsufficientDegreesOfFreedom {
                n_points: *n_points,
                n_params: *n_params,
            })
        }
        _ => {}
    }

    if state.collapsed_iterations > 0 {
        warnings.push(FitWarning::RobustWeightsCollapsed {
            iterations: state.collapsed_iterations,
        });
    }
    warnings.extend((problem.ops.diagnostics)(data, &state.params));

    let model = ModelSpec::from_values_unchecked(kind, &state.params);
    let parameters = parameter_estimates(&model, covariance.as_ref().ok());
    let quality = FitQuality::from_residuals(data.current_density(), &residuals, p);

    tracing::info!(
        model = %kind,
        loss = %config.loss,
        status = status.display_name(),
        iterations = state.iterations,
        params = ?state.params,
        rmse = quality.rmse,
        "fit finished"
    );
    for w in &warnings {
        tracing::warn!(model = %kind, "{w}");
    }

    Ok(FitResult {
        model,
        initial,
        loss: config.loss,
        parameters,
        covariance,
        voltages: data.voltages().to_vec(),
        observed: data.current_density().to_vec(),
        fitted,
        residuals,
        weights,
        quality,
        iterations: state.iterations,
        status,
        warnings,
        temperature: data.temperature(),
        state: converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SweepSpec, generate_sweep};
    use crate::domain::{BdrParams, LossKind, SimmonsParams};

    fn simmons_truth() -> ModelSpec {
        ModelSpec::Simmons(SimmonsParams {
            barrier_height: 1.0,
            thickness: 1.5,
        })
    }

    fn noiseless(model: ModelSpec) -> NormalizedDataset {
        generate_sweep(&SweepSpec::new(model, -0.5, 0.5, 101)).unwrap()
    }

    #[test]
    fn recovers_noiseless_simmons_from_offset_start() {
        let data = noiseless(simmons_truth());
        let start = ModelSpec::Simmons(SimmonsParams {
            barrier_height: 1.3,
            thickness: 1.3,
        });
        let result = fit(&data, &start, &FitConfig::default()).unwrap();
        assert_eq!(result.status(), ConvergenceStatus::Converged);
        let v = result.model().values();
        assert!((v[0] - 1.0).abs() < 1e-4, "phi = {}", v[0]);
        assert!((v[1] - 1.5).abs() < 1e-4, "d = {}", v[1]);
    }

    #[test]
    fn recovers_noiseless_bdr_with_auto_guess() {
        let truth = ModelSpec::Bdr(BdrParams {
            phi1: 1.0,
            phi2: 1.2,
            thickness: 2.0,
        });
        let data = noiseless(truth);
        let result = fit_auto(&data, ModelKind::Bdr, &FitConfig::default()).unwrap();
        assert_eq!(result.status(), ConvergenceStatus::Converged);
        for (got, want) in result.model().values().iter().zip(truth.values()) {
            assert!((got - want).abs() < 1e-4 * want);
        }
    }

    #[test]
    fn too_few_points_is_invalid_data() {
        let data = NormalizedDataset::from_density(vec![0.1], vec![1.0], None).unwrap();
        assert!(matches!(
            fit(&data, &simmons_truth(), &FitConfig::default()),
            Err(FitError::InvalidData(_))
        ));
    }

    #[test]
    fn malformed_explicit_guess_is_invalid_config() {
        let data = noiseless(simmons_truth());
        let config = FitConfig {
            initial_guess: InitialGuess::Explicit(vec![1.0, 1.5, 2.0]),
            ..Default::default()
        };
        assert!(matches!(
            fit(&data, &simmons_truth(), &config),
            Err(FitError::InvalidConfig(_))
        ));
    }

    #[test]
    fn start_outside_bounds_is_projected() {
        let data = noiseless(simmons_truth());
        let config = FitConfig {
            bounds: Some(ParamBounds {
                lower: vec![0.5, 1.0],
                upper: vec![2.0, 2.0],
            }),
            ..Default::default()
        };
        let start = ModelSpec::Simmons(SimmonsParams {
            barrier_height: 9.0,
            thickness: 0.2,
        });
        let result = fit(&data, &start, &config).unwrap();
        assert_eq!(result.initial().values(), vec![2.0, 1.0]);
        assert!(config.bounds.unwrap().contains(&result.model().values()));
    }

    #[test]
    fn max_iterations_is_reported() {
        let data = noiseless(simmons_truth());
        let start = ModelSpec::Simmons(SimmonsParams {
            barrier_height: 2.0,
            thickness: 1.0,
        });
        let config = FitConfig {
            max_iterations: 1,
            ..Default::default()
        };
        let result = fit(&data, &start, &config).unwrap();
        assert_eq!(result.status(), ConvergenceStatus::MaxIterations);
        assert_eq!(result.iterations(), 1);
    }

    #[test]
    fn zero_wall_time_stops_before_first_step() {
        let data = noiseless(simmons_truth());
        let config = FitConfig {
            max_wall_time: Some(std::time::Duration::ZERO),
            ..Default::default()
        };
        let result = fit(&data, &simmons_truth(), &config).unwrap();
        assert_eq!(result.status(), ConvergenceStatus::MaxIterations);
        assert!(
            result
                .warnings()
                .iter()
                .any(|w| matches!(w, FitWarning::WallTimeExceeded { .. }))
        );
    }

    #[test]
    fn robust_fit_reports_weights() {
        let mut spec = SweepSpec::new(simmons_truth(), -0.5, 0.5, 101);
        spec.noise = 0.005;
        spec.seed = 3;
        spec.outlier = Some((80, 100.0));
        let data = generate_sweep(&spec).unwrap();
        let config = FitConfig {
            initial_guess: InitialGuess::Auto,
            ..FitConfig::with_loss(LossKind::Tukey)
        };
        let result = fit(&data, &simmons_truth(), &config).unwrap();
        assert_eq!(result.weights().len(), 101);
        assert!(result.weights()[80] < 0.1);
        assert_eq!(result.loss(), LossKind::Tukey);
    }

    #[test]
    fn zero_bias_only_data_leaves_covariance_singular() {
        let data = NormalizedDataset::from_density(vec![0.0; 5], vec![0.0; 5], None).unwrap();
        let result = fit(&data, &simmons_truth(), &FitConfig::default()).unwrap();
        assert_eq!(result.status(), ConvergenceStatus::Converged);
        assert_eq!(result.model().values(), vec![1.0, 1.5]);
        assert!(matches!(result.covariance(), Err(FitError::SingularJacobian)));
        assert!(result.warnings().contains(&FitWarning::SingularJacobian));
        assert!(result.parameters().iter().all(|p| p.std_error.is_none()));
    }

    #[test]
    fn duplicate_voltages_are_reported_on_the_result() {
        let c = PhysicalConstants::default();
        let voltages = vec![0.1, 0.1, 0.2, 0.3, -0.2];
        let mut density: Vec<f64> = voltages
            .iter()
            .map(|&v| simmons_truth().predict(v, &c))
            .collect();
        density[1] *= 1.01;
        let data = NormalizedDataset::from_density(voltages, density, None).unwrap();
        let result = fit(&data, &simmons_truth(), &FitConfig::default()).unwrap();
        assert!(
            result
                .warnings()
                .contains(&FitWarning::DuplicateVoltages { count: 1 })
        );
    }

    #[test]
    fn unfittable_data_diverges() {
        // Sign flips on every point: no barrier reproduces this.
        let voltages: Vec<f64> = (0..11).map(|i| -0.5 + 0.1 * i as f64).collect();
        let density: Vec<f64> = (0..11)
            .map(|i| if i % 2 == 0 { 1e6 } else { -1e6 })
            .collect();
        let data = NormalizedDataset::from_density(voltages, density, None).unwrap();
        for limit in [1, 3] {
            let config = FitConfig {
                max_lambda_escalations: limit,
                ..Default::default()
            };
            let result = fit(&data, &simmons_truth(), &config).unwrap();
            assert_eq!(result.status(), ConvergenceStatus::Diverged, "limit {limit}");
            assert!(result.iterations() < config.max_iterations);
        }
    }
}

//! Shared "fit pipeline" logic behind `jvfit fit`.
//!
//! Keeping this in one place keeps the workflow in one readable sequence:
//! settings -> CSV ingest -> fit (single or batch) -> per-input outputs
//!
//! `app` can then focus on presentation (printing, plotting, exports).

use std::path::Path;
use std::time::Duration;

use crate::cli::FitArgs;
use crate::config::FitSettings;
use crate::domain::{FitConfig, FitResult, InitialGuess, ModelKind, ModelSpec, ParamBounds};
use crate::error::{AppError, FitError};
use crate::fit::{FitJob, fit, fit_batch};
use crate::io::{IngestOptions, IngestedData, load_jv_csv};
use crate::models::PhysicalConstants;

/// A loaded input together with its fit.
#[derive(Debug, Clone)]
pub struct FittedInput {
    pub ingest: IngestedData,
    pub result: FitResult,
}

/// Outcome of one input file: a failed load or fit is kept per file.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub label: String,
    pub outcome: Result<FittedInput, AppError>,
}

/// All computed outputs of a single `jvfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub config: FitConfig,
    pub runs: Vec<FitRun>,
}

/// Build the fit configuration: defaults, then the TOML file, then flags.
pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let settings = match &args.config {
        Some(path) => FitSettings::load(path)?,
        None => FitSettings::default(),
    };
    let cfg = settings.apply(args.model, FitConfig::default())?;
    Ok(apply_flags(args, cfg)?)
}

fn apply_flags(args: &FitArgs, base: FitConfig) -> Result<FitConfig, FitError> {
    let mut cfg = base;
    if let Some(loss) = args.loss {
        cfg.loss = loss;
    }
    if args.robust_k.is_some() {
        cfg.robust_k = args.robust_k;
    }
    if args.robust_scale.is_some() {
        cfg.robust_scale = args.robust_scale;
    }
    if let Some(v) = args.max_iterations {
        cfg.max_iterations = v;
    }
    if let Some(v) = args.x_tol {
        cfg.x_tol = v;
    }
    if let Some(v) = args.f_tol {
        cfg.f_tol = v;
    }
    if let Some(ms) = args.max_time_ms {
        cfg.max_wall_time = Some(Duration::from_millis(ms));
    }
    if let Some(ratio) = args.effective_mass {
        cfg.constants = PhysicalConstants::with_effective_mass(ratio)?;
    }
    if let (Some(lower), Some(upper)) = (&args.lower, &args.upper) {
        let bounds = ParamBounds {
            lower: lower.clone(),
            upper: upper.clone(),
        };
        bounds.validate(args.model)?;
        cfg.bounds = Some(bounds);
    }
    cfg.initial_guess = match &args.guess {
        Some(values) => InitialGuess::Explicit(values.clone()),
        None => InitialGuess::Auto,
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Load every input with the same unit options. A file that fails to load is
/// kept as an error in its slot.
pub fn load_inputs(args: &FitArgs) -> Vec<(String, Result<IngestedData, AppError>)> {
    let opts = IngestOptions {
        current_unit: args.current_unit,
        area: args.area,
        area_unit: args.area_unit,
        temperature: args.temperature,
    };
    args.inputs
        .iter()
        .map(|path| {
            let ingest = load_jv_csv(path, &opts);
            match &ingest {
                Ok(ingest) => tracing::info!(
                    file = %path.display(),
                    rows = ingest.rows_read,
                    used = ingest.rows_used,
                    "loaded J-V data"
                ),
                Err(err) => tracing::warn!(file = %path.display(), "load failed: {err}"),
            }
            (label_for(path), ingest)
        })
        .collect()
}

/// Execute the full pipeline: one fit per input, in parallel when there are several.
///
/// With a single input any failure is returned as the error. With several,
/// failures stay on their [`FitRun`].
pub fn run_fit(args: &FitArgs) -> Result<RunOutput, AppError> {
    let config = fit_config_from_args(args)?;
    let mut inputs = load_inputs(args);
    let start = start_model(args.model);

    if inputs.len() == 1 {
        let Some((label, ingest)) = inputs.pop() else {
            return Err(AppError::new(2, "No input files given."));
        };
        let ingest = ingest?;
        let result = fit(&ingest.data, &start, &config)?;
        let runs = vec![FitRun {
            label,
            outcome: Ok(FittedInput { ingest, result }),
        }];
        return Ok(RunOutput { config, runs });
    }

    let jobs: Vec<FitJob> = inputs
        .iter()
        .filter_map(|(label, ingest)| ingest.as_ref().ok().map(|ingest| (label, ingest)))
        .map(|(label, ingest)| FitJob {
            label: label.clone(),
            data: ingest.data.clone(),
            model: start,
            config: config.clone(),
        })
        .collect();
    let mut results = fit_batch(&jobs).into_iter();

    let runs = inputs
        .into_iter()
        .map(|(label, ingest)| {
            let outcome = ingest.and_then(|ingest| {
                let result = results
                    .next()
                    .unwrap_or_else(|| Err(FitError::InvalidData("missing batch result".into())))?;
                Ok(FittedInput { ingest, result })
            });
            FitRun { label, outcome }
        })
        .collect();

    Ok(RunOutput { config, runs })
}

/// Error when every run of a batch failed; the first failure sets the exit code.
pub fn batch_status(runs: &[FitRun]) -> Result<(), AppError> {
    if runs.iter().any(|run| run.outcome.is_ok()) {
        return Ok(());
    }
    let code = runs
        .iter()
        .find_map(|run| run.outcome.as_ref().err())
        .map(|err| err.exit_code())
        .unwrap_or(2);
    Err(AppError::new(code, format!("All {} fits failed.", runs.len())))
}

/// Placeholder start; the configured guess policy (`Auto` or `Explicit`) replaces its values.
fn start_model(kind: ModelKind) -> ModelSpec {
    ModelSpec::from_values_unchecked(kind, &kind.default_bounds().lower)
}

fn label_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use crate::domain::LossKind;
    use clap::Parser;

    fn fit_args(extra: &[&str]) -> FitArgs {
        let mut argv = vec!["jvfit", "fit", "-i", "a.csv", "-m", "simmons"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Fit(args) => args,
            _ => panic!("expected fit"),
        }
    }

    #[test]
    fn flags_overlay_defaults() {
        let args = fit_args(&[
            "--loss", "huber", "--max-iter", "40", "--guess", "1.0,1.5", "--lower", "0.5,1.0",
            "--upper", "2.0,2.0",
        ]);
        let cfg = fit_config_from_args(&args).unwrap();
        assert_eq!(cfg.loss, LossKind::Huber);
        assert_eq!(cfg.max_iterations, 40);
        assert_eq!(cfg.initial_guess, InitialGuess::Explicit(vec![1.0, 1.5]));
        assert_eq!(cfg.bounds.unwrap().upper, vec![2.0, 2.0]);
    }

    #[test]
    fn no_guess_means_auto() {
        let cfg = fit_config_from_args(&fit_args(&[])).unwrap();
        assert_eq!(cfg.initial_guess, InitialGuess::Auto);
    }

    #[test]
    fn bad_bounds_are_config_errors() {
        let args = fit_args(&["--lower", "0.5", "--upper", "2.0"]);
        let err = fit_config_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    fn run(label: &str, outcome: Result<FittedInput, AppError>) -> FitRun {
        FitRun {
            label: label.to_string(),
            outcome,
        }
    }

    #[test]
    fn batch_keeps_going_past_an_unreadable_file() {
        let dir = std::env::temp_dir().join(format!("jvfit-batch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.csv");
        let constants = PhysicalConstants::default();
        let mut csv = String::from("V,J\n");
        for i in 0..41 {
            let v = -0.4 + 0.02 * i as f64;
            let j = crate::models::simmons::current_density(v, 1.0, 1.5, &constants);
            csv.push_str(&format!("{v},{j:e}\n"));
        }
        std::fs::write(&good, csv).unwrap();
        let missing = dir.join("missing.csv");

        let mut args = fit_args(&[]);
        args.inputs = vec![missing, good];
        let output = run_fit(&args).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(output.runs.len(), 2);
        assert_eq!(output.runs[0].label, "missing.csv");
        assert_eq!(output.runs[0].outcome.as_ref().unwrap_err().exit_code(), 2);
        let fitted = output.runs[1].outcome.as_ref().unwrap();
        assert!((fitted.result.model().values()[0] - 1.0).abs() < 1e-2);
        assert!(batch_status(&output.runs).is_ok());
    }

    #[test]
    fn batch_with_no_success_is_an_error() {
        let runs = vec![
            run("a.csv", Err(AppError::new(3, "Invalid data: empty"))),
            run("b.csv", Err(AppError::new(2, "Failed to open CSV"))),
        ];
        let err = batch_status(&runs).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "All 2 fits failed.");
        assert!(batch_status(&[]).is_err());
    }

    #[test]
    fn labels_use_file_names() {
        assert_eq!(label_for(Path::new("/data/run1/sweep.csv")), "sweep.csv");
    }
}

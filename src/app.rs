//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - loads J-V files and runs the fits
//! - prints reports/plots
//! - writes optional exports and synthetic sweeps

use chrono::Utc;
use clap::Parser;

use crate::cli::{Command, FitArgs, PlotArgs, SimulateArgs};
use crate::data::{SweepSpec, generate_sweep};
use crate::domain::ModelSpec;
use crate::error::AppError;
use crate::io::{FitFile, SweepColumns};
use crate::models::PhysicalConstants;
use crate::plot::PlotScale;

pub mod pipeline;

use pipeline::FittedInput;

/// Entry point for the `jvfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Plot(args) => handle_plot(args),
    }
}

/// Log to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    if args.inputs.len() > 1 && (args.export.is_some() || args.export_fit.is_some()) {
        return Err(AppError::new(
            2,
            "--export and --export-fit need a single --input file.",
        ));
    }

    let output = pipeline::run_fit(&args)?;

    if output.runs.len() > 1 {
        let rows: Vec<_> = output
            .runs
            .iter()
            .map(|run| {
                let result = run.outcome.as_ref().map(|fitted| fitted.result.clone());
                (run.label.clone(), result.map_err(Clone::clone))
            })
            .collect();
        println!("{}", crate::report::format_batch_table(&rows));
        return pipeline::batch_status(&output.runs);
    }

    let Some(run) = output.runs.into_iter().next() else {
        return Err(AppError::new(2, "No input files given."));
    };
    let FittedInput { ingest, result } = run.outcome?;

    println!(
        "{}",
        crate::report::format_fit_summary(&run.label, &ingest.data, &result)
    );
    if !ingest.row_errors.is_empty() {
        println!(
            "Skipped {} of {} rows (first at line {}).",
            ingest.row_errors.len(),
            ingest.rows_read,
            ingest.row_errors[0].line
        );
    }

    if args.plot && !args.no_plot {
        let plot = crate::plot::render_fit_plot(
            &result,
            &output.config.constants,
            args.width,
            args.height,
            plot_scale(args.log),
        );
        println!("{plot}");
    }

    if let Some(path) = &args.export {
        crate::io::write_results_csv(path, &result)?;
        tracing::info!(path = %path.display(), "wrote per-point results");
    }
    if let Some(path) = &args.export_fit {
        let file = FitFile::from_result(
            &result,
            &output.config.constants,
            Some(run.label.clone()),
            Utc::now(),
        );
        crate::io::write_fit_json(path, &file)?;
        tracing::info!(path = %path.display(), "wrote fit file");
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let model = ModelSpec::from_values(args.model, &args.params)?;
    let constants = match args.effective_mass {
        Some(ratio) => PhysicalConstants::with_effective_mass(ratio)?,
        None => PhysicalConstants::default(),
    };
    let spec = SweepSpec {
        noise: args.noise,
        seed: args.seed,
        outlier: args.outlier_index.zip(args.outlier_factor),
        constants,
        ..SweepSpec::new(model, args.v_min, args.v_max, args.points)
    };
    let data = generate_sweep(&spec)?;

    let columns = match args.area {
        Some(area) => SweepColumns::Current {
            area,
            area_unit: args.area_unit,
            unit: args.current_unit,
        },
        None => SweepColumns::Density,
    };
    crate::io::write_sweep_csv(&args.output, &data, columns)?;
    println!(
        "Wrote {} points of {} to {}",
        data.len(),
        args.model.display_name(),
        args.output.display()
    );
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let file = crate::io::read_fit_json(&args.fit)?;
    println!("{}", crate::report::format_fit_file_summary(&file));
    let plot =
        crate::plot::render_fit_file_plot(&file, args.width, args.height, plot_scale(args.log));
    println!("{plot}");
    Ok(())
}

fn plot_scale(log: bool) -> PlotScale {
    if log {
        PlotScale::LogAbs
    } else {
        PlotScale::Linear
    }
}

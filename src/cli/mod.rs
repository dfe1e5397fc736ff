//! Command-line parsing for the tunneling-barrier fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code. Every fit flag is optional so that it can
//! overlay a TOML settings file; unset flags leave the file (or the default) alone.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::domain::{AreaUnit, CurrentUnit, LossKind, ModelKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "jvfit",
    version,
    about = "Tunneling barrier parameters from J-V curves (Simmons / BDR)"
)]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one or more J-V CSV files, print the report and optionally plot/export.
    ///
    /// Several inputs are fitted in parallel and summarized in one table.
    Fit(FitArgs),
    /// Write a synthetic (optionally noisy) J-V sweep to CSV.
    Simulate(SimulateArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Input CSV file(s) with a voltage column and a current or density column.
    #[arg(short, long = "input", value_name = "CSV", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Barrier model (simmons, bdr).
    #[arg(short, long)]
    pub model: ModelKind,

    /// Unit of the current column (A, mA, uA).
    #[arg(long, default_value = "A")]
    pub current_unit: CurrentUnit,

    /// Junction area; required when the file has raw currents.
    #[arg(long)]
    pub area: Option<f64>,

    /// Unit of --area (cm2, m2, nm2).
    #[arg(long, default_value = "cm2")]
    pub area_unit: AreaUnit,

    /// Measurement temperature in kelvin (reported, not modeled).
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Loss function (l2, huber, tukey).
    #[arg(long)]
    pub loss: Option<LossKind>,

    /// Robust threshold in units of the robust scale.
    #[arg(long)]
    pub robust_k: Option<f64>,

    /// Fixed robust scale in A/m² (default: MAD of the residuals).
    #[arg(long)]
    pub robust_scale: Option<f64>,

    /// Explicit starting parameters, comma separated (e.g. 1.0,1.5).
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub guess: Option<Vec<f64>>,

    /// Lower parameter bounds, comma separated.
    #[arg(long, value_delimiter = ',', num_args = 1.., requires = "upper")]
    pub lower: Option<Vec<f64>>,

    /// Upper parameter bounds, comma separated.
    #[arg(long, value_delimiter = ',', num_args = 1.., requires = "lower")]
    pub upper: Option<Vec<f64>>,

    /// Maximum LM iterations.
    #[arg(long = "max-iter")]
    pub max_iterations: Option<usize>,

    /// Relative parameter-step tolerance.
    #[arg(long)]
    pub x_tol: Option<f64>,

    /// Relative cost-change tolerance.
    #[arg(long)]
    pub f_tol: Option<f64>,

    /// Wall-time budget per fit in milliseconds.
    #[arg(long)]
    pub max_time_ms: Option<u64>,

    /// Effective mass ratio m*/m_e.
    #[arg(long)]
    pub effective_mass: Option<f64>,

    /// TOML settings file (overlaid by the flags above).
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Export per-point results to CSV (single input only).
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export model, parameters, covariance and fitted grid to JSON (single input only).
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot log10|J| instead of J.
    #[arg(long)]
    pub log: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// Options for generating a synthetic sweep.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Barrier model (simmons, bdr).
    #[arg(short, long)]
    pub model: ModelKind,

    /// Model parameters, comma separated (simmons: phi,d; bdr: phi1,phi2,d).
    #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
    pub params: Vec<f64>,

    #[arg(long, default_value_t = -0.5, allow_negative_numbers = true)]
    pub v_min: f64,

    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    pub v_max: f64,

    #[arg(long, default_value_t = 101)]
    pub points: usize,

    /// Gaussian noise sigma as a fraction of max|J|.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write currents for this junction area; without it the file holds J in A/m².
    #[arg(long)]
    pub area: Option<f64>,

    #[arg(long, default_value = "cm2")]
    pub area_unit: AreaUnit,

    #[arg(long, default_value = "A")]
    pub current_unit: CurrentUnit,

    /// Index of a point to turn into an outlier.
    #[arg(long, requires = "outlier_factor")]
    pub outlier_index: Option<usize>,

    /// Factor applied to the outlier point.
    #[arg(long, requires = "outlier_index", allow_negative_numbers = true)]
    pub outlier_factor: Option<f64>,

    /// Effective mass ratio m*/m_e.
    #[arg(long)]
    pub effective_mass: Option<f64>,

    /// Output CSV path.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,
}

/// Options for plotting a saved fit.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Fit JSON file produced by `jvfit fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot log10|J| instead of J.
    #[arg(long)]
    pub log: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

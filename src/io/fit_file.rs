//! Read/write fit JSON files.
//!
//! A fit file is the portable record of one fit:
//! - model, parameters with units and standard errors, covariance
//! - quality, convergence status and warnings
//! - the constants used, so the curve can be re-evaluated
//! - a precomputed fitted grid and the data, for re-plotting without refitting

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ConvergenceStatus, CovarianceMatrix, FitQuality, FitResult, FitWarning, LossKind, ModelSpec,
    ParameterEstimate,
};
use crate::error::AppError;
use crate::models::PhysicalConstants;

const GRID_POINTS: usize = 201;

/// Fitted curve sampled on a uniform voltage grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitGrid {
    pub voltage: Vec<f64>,
    pub current_density: Vec<f64>,
}

/// Observed points with their final robust weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitData {
    pub voltage: Vec<f64>,
    pub current_density: Vec<f64>,
    pub weight: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub source: Option<String>,
    pub model: ModelSpec,
    pub loss: LossKind,
    pub status: ConvergenceStatus,
    pub iterations: usize,
    pub parameters: Vec<ParameterEstimate>,
    pub covariance: Option<CovarianceMatrix>,
    pub quality: FitQuality,
    pub warnings: Vec<FitWarning>,
    pub temperature: Option<f64>,
    pub constants: PhysicalConstants,
    pub grid: FitGrid,
    pub data: FitData,
}

impl FitFile {
    pub fn from_result(
        result: &FitResult,
        constants: &PhysicalConstants,
        source: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tool: "jvfit".to_string(),
            created_at,
            source,
            model: *result.model(),
            loss: result.loss(),
            status: result.status(),
            iterations: result.iterations(),
            parameters: result.parameters().to_vec(),
            covariance: result.covariance().ok().cloned(),
            quality: result.quality().clone(),
            warnings: result.warnings().to_vec(),
            temperature: result.temperature(),
            constants: *constants,
            grid: build_grid(result.model(), result.voltages(), constants, GRID_POINTS),
            data: FitData {
                voltage: result.voltages().to_vec(),
                current_density: result.observed().to_vec(),
                weight: result.weights().to_vec(),
            },
        }
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, fit_file: &FitFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, fit_file)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display()))
    })?;
    let fit_file: FitFile = serde_json::from_reader(file)
        .map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;
    Ok(fit_file)
}

fn build_grid(
    model: &ModelSpec,
    voltages: &[f64],
    constants: &PhysicalConstants,
    n: usize,
) -> FitGrid {
    let n = n.max(2);
    let (mut v0, mut v1) = voltages
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !(v0.is_finite() && v1.is_finite()) || v1 <= v0 {
        let center = if v0.is_finite() { v0 } else { 0.0 };
        v0 = center - 0.1;
        v1 = center + 0.1;
    }

    let voltage: Vec<f64> = (0..n)
        .map(|i| v0 + (v1 - v0) * i as f64 / (n - 1) as f64)
        .collect();
    let current_density = voltage.iter().map(|&v| model.predict(v, constants)).collect();
    FitGrid {
        voltage,
        current_density,
    }
}

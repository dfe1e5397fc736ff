//! Reporting utilities: residual rankings and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::FitResult;

/// One point of a fit with its residual.
#[derive(Debug, Clone, PartialEq)]
pub struct PointResidual {
    pub index: usize,
    pub voltage: f64,
    pub observed: f64,
    pub fitted: f64,
    pub residual: f64,
    pub weight: f64,
}

/// The `top_n` points with the largest |residual|, largest first (ties by index).
pub fn largest_residuals(result: &FitResult, top_n: usize) -> Vec<PointResidual> {
    let mut rows: Vec<PointResidual> = (0..result.residuals().len())
        .map(|i| PointResidual {
            index: i,
            voltage: result.voltages()[i],
            observed: result.observed()[i],
            fitted: result.fitted()[i],
            residual: result.residuals()[i],
            weight: result.weights()[i],
        })
        .collect();
    rows.sort_by(|a, b| {
        b.residual
            .abs()
            .total_cmp(&a.residual.abs())
            .then(a.index.cmp(&b.index))
    });
    rows.truncate(top_n);
    rows
}

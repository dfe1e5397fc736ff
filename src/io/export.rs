//! CSV exports: per-point fit results and synthetic sweeps.
//!
//! Exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::data::density_to_current;
use crate::domain::{AreaUnit, CurrentUnit, FitResult, NormalizedDataset};
use crate::error::AppError;

/// How a sweep's current column is written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepColumns {
    /// `V,J` in A/m².
    Density,
    /// `V,I` in `unit`, for a junction of `area` (`area_unit`).
    Current {
        area: f64,
        area_unit: AreaUnit,
        unit: CurrentUnit,
    },
}

/// Write per-point results to a CSV file.
pub fn write_results_csv(path: &Path, result: &FitResult) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;
    write_results(file, result)
}

/// Per-point rows: `voltage,j_obs,j_fit,residual,weight`.
pub fn write_results<W: Write>(mut out: W, result: &FitResult) -> Result<(), AppError> {
    writeln!(out, "voltage,j_obs,j_fit,residual,weight")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for i in 0..result.voltages().len() {
        writeln!(
            out,
            "{:.6},{:.10e},{:.10e},{:.10e},{:.6}",
            result.voltages()[i],
            result.observed()[i],
            result.fitted()[i],
            result.residuals()[i],
            result.weights()[i],
        )
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    Ok(())
}

/// Write a sweep in a format [`crate::io::load_jv_csv`] reads back.
pub fn write_sweep_csv(
    path: &Path,
    data: &NormalizedDataset,
    columns: SweepColumns,
) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create sweep CSV '{}': {e}", path.display()))
    })?;
    write_sweep(file, data, columns)
}

pub fn write_sweep<W: Write>(
    mut out: W,
    data: &NormalizedDataset,
    columns: SweepColumns,
) -> Result<(), AppError> {
    let header = match columns {
        SweepColumns::Density => "V,J",
        SweepColumns::Current { .. } => "V,I",
    };
    writeln!(out, "{header}")
        .map_err(|e| AppError::new(2, format!("Failed to write sweep CSV header: {e}")))?;

    for (v, j) in data.points() {
        let value = match columns {
            SweepColumns::Density => j,
            SweepColumns::Current {
                area,
                area_unit,
                unit,
            } => density_to_current(j, area, area_unit, unit),
        };
        writeln!(out, "{v:.6},{value:.12e}")
            .map_err(|e| AppError::new(2, format!("Failed to write sweep CSV row: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{IngestOptions, read_jv_csv};

    #[test]
    fn sweep_round_trips_through_ingest() {
        let data =
            NormalizedDataset::from_density(vec![-0.1, 0.0, 0.2], vec![-12.5, 0.0, 30.0], None)
                .unwrap();
        let columns = SweepColumns::Current {
            area: 2.0,
            area_unit: AreaUnit::SquareCentimeter,
            unit: CurrentUnit::Microampere,
        };
        let mut buf = Vec::new();
        write_sweep(&mut buf, &data, columns).unwrap();

        let opts = IngestOptions {
            current_unit: CurrentUnit::Microampere,
            area: Some(2.0),
            area_unit: AreaUnit::SquareCentimeter,
            temperature: None,
        };
        let back = read_jv_csv(buf.as_slice(), &opts).unwrap();
        for (a, b) in back.data.current_density().iter().zip(data.current_density()) {
            assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
        }
    }

    #[test]
    fn density_sweep_header() {
        let data = NormalizedDataset::from_density(vec![0.1], vec![1.0], None).unwrap();
        let mut buf = Vec::new();
        write_sweep(&mut buf, &data, SweepColumns::Density).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("V,J\n0.100000,"));
    }
}

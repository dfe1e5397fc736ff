//! CSV ingest.
//!
//! Turns a measurement CSV into a [`NormalizedDataset`] ready to fit.
//!
//! - voltage column: `V` or `voltage` (volts)
//! - current column: `I` or `current` (in the caller's current unit, divided by
//!   the junction area), or `J` or `current_density` (already A/m², area ignored)
//! - header names are case-insensitive; extra columns are ignored
//! - rows with unparsable or non-finite values are skipped and reported by line

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::data::normalize;
use crate::domain::{AreaUnit, CurrentUnit, JvDataset, NormalizedDataset};
use crate::error::AppError;

/// How currents are interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOptions {
    pub current_unit: CurrentUnit,
    /// Junction area, required when the file carries raw currents.
    pub area: Option<f64>,
    pub area_unit: AreaUnit,
    pub temperature: Option<f64>,
}

/// Which current column was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentColumn {
    /// Raw current, normalized by area.
    Current,
    /// Current density in A/m².
    Density,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: fitted-unit dataset + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub data: NormalizedDataset,
    pub column: CurrentColumn,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load a J–V CSV file.
pub fn load_jv_csv(path: &Path, opts: &IngestOptions) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_jv_csv(file, opts)
}

/// Read J–V CSV content from any reader.
pub fn read_jv_csv<R: Read>(input: R, opts: &IngestOptions) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let v_col = find_column(&header_map, &["v", "voltage"])
        .ok_or_else(|| AppError::new(2, "CSV is missing a voltage column (V or voltage)."))?;
    let (i_col, column) = if let Some(idx) = find_column(&header_map, &["i", "current"]) {
        (idx, CurrentColumn::Current)
    } else if let Some(idx) = find_column(&header_map, &["j", "current_density"]) {
        (idx, CurrentColumn::Density)
    } else {
        return Err(AppError::new(
            2,
            "CSV is missing a current column (I/current or J/current_density).",
        ));
    };

    let mut voltages = Vec::new();
    let mut currents = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        match (parse_field(&record, v_col, "voltage"), parse_field(&record, i_col, "current")) {
            (Ok(v), Ok(i)) => {
                voltages.push(v);
                currents.push(i);
            }
            (Err(message), _) | (_, Err(message)) => row_errors.push(RowError { line, message }),
        }
    }

    for e in &row_errors {
        tracing::warn!(line = e.line, "skipped row: {}", e.message);
    }

    let rows_used = voltages.len();
    if rows_used == 0 {
        return Err(AppError::new(3, "No valid rows in CSV."));
    }

    let data = match column {
        CurrentColumn::Density => {
            NormalizedDataset::from_density(voltages, currents, opts.temperature)?
        }
        CurrentColumn::Current => {
            let area = opts.area.ok_or_else(|| {
                AppError::new(2, "CSV has raw currents; --area is required to normalize them.")
            })?;
            let raw = JvDataset::new(voltages, currents, area, opts.temperature)?;
            normalize(&raw, opts.current_unit, opts.area_unit)?
        }
    };

    Ok(IngestedData {
        data,
        column,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM some spreadsheet tools put on the first header.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| header_map.get(*n).copied())
}

fn parse_field(record: &StringRecord, idx: usize, what: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .ok_or_else(|| format!("Missing {what} field"))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("Invalid {what} '{raw}'"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("Non-finite {what} '{raw}'"))
    }
}

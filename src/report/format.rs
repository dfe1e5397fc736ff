//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use std::fmt::Display;

use crate::domain::{
    CovarianceMatrix, FitResult, FitWarning, ModelKind, NormalizedDataset, ParameterEstimate,
};
use crate::io::FitFile;
use crate::report::largest_residuals;

/// Full report for one fit.
pub fn format_fit_summary(source: &str, data: &NormalizedDataset, result: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("=== jvfit - Tunneling Barrier Fit ===\n");
    out.push_str(&format!("Source: {source}\n"));
    let (v_min, v_max) = data.voltage_range();
    out.push_str(&format!(
        "Points: n={} | V=[{:.3}, {:.3}] V | max|J|={:.4e} A/m^2\n",
        data.len(),
        v_min,
        v_max,
        data.max_abs_density()
    ));
    if let Some(t) = result.temperature() {
        out.push_str(&format!("Temperature: {t:.2} K (not used by the models)\n"));
    }

    let kind = result.model().kind();
    out.push_str(&format!(
        "\nModel: {} | loss: {} | status: {} after {} iteration(s)\n",
        kind.display_name(),
        result.loss().display_name(),
        result.status().display_name(),
        result.iterations()
    ));
    out.push_str(&format!(
        "Start: {}\n",
        fmt_vec(&result.initial().values())
    ));

    out.push_str("\nParameters:\n");
    out.push_str(&format_parameters(result.parameters()));

    match result.covariance() {
        Ok(cov) => {
            out.push_str("\nCorrelation:\n");
            out.push_str(&format_correlation(kind, cov));
        }
        Err(err) => out.push_str(&format!("\nCovariance unavailable: {err}\n")),
    }

    let q = result.quality();
    out.push_str("\nQuality:\n");
    out.push_str(&format!("- SSE  : {:.6e} (A/m^2)^2\n", q.sse));
    out.push_str(&format!("- RMSE : {:.6e} A/m^2\n", q.rmse));
    match q.reduced_chi_square {
        Some(chi2) => out.push_str(&format!("- chi2/dof: {chi2:.6e}\n")),
        None => out.push_str("- chi2/dof: n/a (no degrees of freedom)\n"),
    }
    out.push_str(&format!("- R^2  : {:.6}\n", q.r_squared));

    out.push_str(&format_warnings(result.warnings()));

    out.push_str("\nLargest residuals:\n");
    out.push_str(&format!(
        "{:>5} {:>9} {:>13} {:>13} {:>13} {:>7}\n",
        "idx", "V", "J_obs", "J_fit", "residual", "weight"
    ));
    for r in largest_residuals(result, 5) {
        out.push_str(&format!(
            "{:>5} {:>9.4} {:>13.4e} {:>13.4e} {:>13.4e} {:>7.3}\n",
            r.index, r.voltage, r.observed, r.fitted, r.residual, r.weight
        ));
    }

    out
}

/// Parameter table: `name  value ± std_error unit`.
pub fn format_parameters(params: &[ParameterEstimate]) -> String {
    let mut out = String::new();
    for p in params {
        let se = p
            .std_error
            .map(|s| format!("± {s:.4e}"))
            .unwrap_or_else(|| "± n/a".to_string());
        let derived = if p.derived { " (derived)" } else { "" };
        out.push_str(&format!(
            "- {:<10} {:>12.6} {:<14} {}{}\n",
            p.name, p.value, se, p.unit, derived
        ));
    }
    out
}

fn format_correlation(kind: ModelKind, cov: &CovarianceMatrix) -> String {
    let names = kind.param_names();
    let mut out = String::new();
    out.push_str(&format!("{:<10}", ""));
    for name in names {
        out.push_str(&format!(" {name:>9}"));
    }
    out.push('\n');
    for (i, name) in names.iter().enumerate() {
        out.push_str(&format!("{name:<10}"));
        for j in 0..cov.dim() {
            out.push_str(&format!(" {:>9.4}", cov.correlation(i, j)));
        }
        out.push('\n');
    }
    out
}

fn format_warnings(warnings: &[FitWarning]) -> String {
    if warnings.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nWarnings:\n");
    for w in warnings {
        out.push_str(&format!("- {w}\n"));
    }
    out
}

/// One row per job: label, status, parameters, RMSE (or the error).
pub fn format_batch_table<E: Display>(rows: &[(String, Result<FitResult, E>)]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<28} {:<8} {:<15} {:<40} {:>12}\n",
            "input", "model", "status", "parameters", "rmse"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<28} {:-<8} {:-<15} {:-<40} {:-<12}\n",
            "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for (label, result) in rows {
        let line = match result {
            Ok(r) => {
                let params = r
                    .parameters()
                    .iter()
                    .filter(|p| !p.derived)
                    .map(|p| format!("{}={:.4}", p.name, p.value))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!(
                    "{:<28} {:<8} {:<15} {:<40} {:>12.4e}",
                    truncate(label, 28),
                    r.model().kind().display_name(),
                    r.status().display_name(),
                    params,
                    r.quality().rmse
                )
            }
            Err(err) => format!("{:<28} error: {err}", truncate(label, 28)),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Short summary of a saved fit file.
pub fn format_fit_file_summary(file: &FitFile) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Fit: {} ({}) | loss: {} | status: {} | created {}\n",
        file.model.kind().display_name(),
        file.source.as_deref().unwrap_or("unknown source"),
        file.loss.display_name(),
        file.status.display_name(),
        file.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format_parameters(&file.parameters));
    out.push_str(&format_warnings(&file.warnings));
    out
}

fn fmt_vec(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{keep}~")
}

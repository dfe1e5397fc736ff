//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic output (golden tests below).
//!
//! Plot elements:
//! - observed points: `o`
//! - points the robust loss down-weighted below one half: `x`
//! - fitted curve: `-` line

use crate::domain::FitResult;
use crate::io::FitFile;
use crate::models::PhysicalConstants;

/// Vertical axis of a J-V plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotScale {
    /// J in A/m².
    #[default]
    Linear,
    /// log10 |J|; zero-current points are skipped.
    LogAbs,
}

impl PlotScale {
    fn transform(self, j: f64) -> Option<f64> {
        match self {
            PlotScale::Linear => j.is_finite().then_some(j),
            PlotScale::LogAbs => {
                let a = j.abs();
                (a > 0.0 && a.is_finite()).then(|| a.log10())
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            PlotScale::Linear => "J",
            PlotScale::LogAbs => "log10|J|",
        }
    }
}

/// One observed point on the plot.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Marker {
    voltage: f64,
    density: f64,
    weight: f64,
}

/// Render data and fitted curve for an in-memory fit.
pub fn render_fit_plot(
    fit: &FitResult,
    constants: &PhysicalConstants,
    width: usize,
    height: usize,
    scale: PlotScale,
) -> String {
    let markers: Vec<Marker> = (0..fit.voltages().len())
        .map(|i| Marker {
            voltage: fit.voltages()[i],
            density: fit.observed()[i],
            weight: fit.weights()[i],
        })
        .collect();
    let (v_min, v_max) = voltage_range(markers.iter().map(|m| m.voltage)).unwrap_or((-0.5, 0.5));
    let curve = sample_curve(
        |v| fit.model().predict(v, constants),
        v_min,
        v_max,
        width.max(2),
    );
    render_plot(&markers, &curve, v_min, v_max, width, height, scale)
}

/// Render a plot from a saved fit file (its grid plus stored data).
pub fn render_fit_file_plot(
    file: &FitFile,
    width: usize,
    height: usize,
    scale: PlotScale,
) -> String {
    let markers: Vec<Marker> = file
        .data
        .voltage
        .iter()
        .zip(&file.data.current_density)
        .zip(&file.data.weight)
        .map(|((&voltage, &density), &weight)| Marker {
            voltage,
            density,
            weight,
        })
        .collect();
    let curve: Vec<(f64, f64)> = file
        .grid
        .voltage
        .iter()
        .zip(&file.grid.current_density)
        .map(|(&v, &j)| (v, j))
        .collect();
    let (v_min, v_max) = voltage_range(
        curve
            .iter()
            .map(|&(v, _)| v)
            .chain(markers.iter().map(|m| m.voltage)),
    )
    .unwrap_or((-0.5, 0.5));
    render_plot(&markers, &curve, v_min, v_max, width, height, scale)
}

fn render_plot(
    markers: &[Marker],
    curve: &[(f64, f64)],
    v_min: f64,
    v_max: f64,
    width: usize,
    height: usize,
    scale: PlotScale,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let points: Vec<(f64, f64, char)> = markers
        .iter()
        .filter_map(|m| {
            let ch = if m.weight < 0.5 { 'x' } else { 'o' };
            scale.transform(m.density).map(|y| (m.voltage, y, ch))
        })
        .collect();
    let curve: Vec<(f64, f64)> = curve
        .iter()
        .filter_map(|&(v, j)| scale.transform(j).map(|y| (v, y)))
        .collect();

    let (y_min, y_max) = y_range(
        points
            .iter()
            .map(|&(_, y, _)| y)
            .chain(curve.iter().map(|&(_, y)| y)),
    )
    .unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so points overlay it.
    draw_curve(&mut grid, &curve, v_min, v_max, y_min, y_max);

    for &(v, y, ch) in &points {
        let x = map_x(v, v_min, v_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][x] = ch;
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: V=[{v_min:.3}, {v_max:.3}] V | {}=[{y_min:.3e}, {y_max:.3e}]\n",
        scale.label()
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn voltage_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

fn y_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| {
        (lo.min(y), hi.max(y))
    });
    if !(lo.is_finite() && hi.is_finite()) {
        return None;
    }
    if hi > lo {
        Some((lo, hi))
    } else {
        let pad = lo.abs().max(1.0) * 0.5;
        Some((lo - pad, hi + pad))
    }
}

fn sample_curve(f: impl Fn(f64) -> f64, v_min: f64, v_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let v = v_min + u * (v_max - v_min);
            (v, f(v))
        })
        .collect()
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(v: f64, v_min: f64, v_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((v - v_min) / (v_max - v_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // row 0 is the top (y_max)
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(
    grid: &mut [Vec<char>],
    curve: &[(f64, f64)],
    v_min: f64,
    v_max: f64,
    y_min: f64,
    y_max: f64,
) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(v, y) in curve {
        let x = map_x(v, v_min, v_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, row, '-');
        } else {
            grid[row][x] = '-';
        }
        prev = Some((x, row));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

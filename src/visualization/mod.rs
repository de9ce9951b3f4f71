//! Visualization tools for repaired cycler logs.
//!
//! Renders a two-panel PNG: the raw and corrected cycle counters over time
//! on top, and the discharge capacity with its peak envelope below.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::loaders::AnnotatedTable;
use crate::processors::peaks::PeakRecord;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Nothing to plot")]
    EmptySeries,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

const RAW_COLOR: RGBColor = RGBColor(153, 153, 153);
const CORRECTED_COLOR: RGBColor = RGBColor(55, 126, 184);
const TEST_COLOR: RGBColor = RGBColor(228, 26, 28);
const CAPACITY_COLOR: RGBColor = RGBColor(166, 206, 227);
const ENVELOPE_COLOR: RGBColor = RGBColor(255, 127, 0);

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Row indices to draw, keeping at most roughly `max_points`.
fn sample_rows(n: usize, max_points: usize) -> Vec<usize> {
    let step = if n > max_points { n / max_points.max(1) } else { 1 };
    (0..n).step_by(step.max(1)).collect()
}

/// Plot the cycle repair and peak envelope of an annotated log.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `annotated` - Pipeline output
/// * `peaks` - Accepted peaks, drawn as markers
/// * `max_points` - Maximum number of rows to plot (subsamples if exceeded)
pub fn plot_cycle_series(
    output_path: &Path,
    annotated: &AnnotatedTable,
    peaks: &[PeakRecord],
    max_points: usize,
) -> Result<()> {
    if annotated.is_empty() {
        return Err(VisualizationError::EmptySeries);
    }

    let table = &annotated.table;
    let rows = sample_rows(annotated.len(), max_points);

    let raw: Vec<(f64, f64)> = rows
        .iter()
        .map(|&i| (table.time_s[i], annotated.raw_cycle_number[i] as f64))
        .collect();
    let corrected: Vec<(f64, f64)> = rows
        .iter()
        .map(|&i| (table.time_s[i], table.cycle_number[i] as f64))
        .collect();
    let test_rows: Vec<(f64, f64)> = rows
        .iter()
        .filter(|&&i| annotated.is_test_cycle[i])
        .map(|&i| (table.time_s[i], annotated.raw_cycle_number[i] as f64))
        .collect();
    let capacity: Vec<(f64, f64)> = rows
        .iter()
        .map(|&i| (table.time_s[i], table.q_discharge[i]))
        .collect();
    let envelope: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|&i| {
            annotated.discharge_peak_value[i].map(|v| (table.time_s[i], v))
        })
        .collect();

    let cycle_bounds = compute_bounds(raw.iter().chain(corrected.iter()));
    let capacity_bounds = compute_bounds(capacity.iter().chain(envelope.iter()));

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let panels = root.split_evenly((2, 1));

    // Cycle counters
    let mut chart = ChartBuilder::on(&panels[0])
        .margin(10)
        .build_cartesian_2d(padded(cycle_bounds.0), padded(cycle_bounds.1))
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(raw, &RAW_COLOR))
        .map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(corrected, &CORRECTED_COLOR))
        .map_err(plot_err)?;
    chart
        .draw_series(
            test_rows
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 2, TEST_COLOR.filled())),
        )
        .map_err(plot_err)?;

    // Discharge capacity and peak envelope
    let mut chart = ChartBuilder::on(&panels[1])
        .margin(10)
        .build_cartesian_2d(padded(capacity_bounds.0), padded(capacity_bounds.1))
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(capacity, &CAPACITY_COLOR))
        .map_err(plot_err)?;
    chart
        .draw_series(LineSeries::new(envelope, ENVELOPE_COLOR.stroke_width(2)))
        .map_err(plot_err)?;
    chart
        .draw_series(
            peaks
                .iter()
                .map(|p| Circle::new((p.time_s, p.value), 5, TEST_COLOR.filled())),
        )
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;

    log::info!(
        "Plotted {} of {} rows to {}",
        rows.len(),
        annotated.len(),
        output_path.display()
    );

    Ok(())
}

/// Axis range with 5% padding on each side.
fn padded((min, max): (f64, f64)) -> std::ops::Range<f64> {
    let padding = (max - min) * 0.05;
    (min - padding)..(max + padding)
}

/// Compute the x and y bounds of a set of points, ignoring non-finite ones.
fn compute_bounds<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> ((f64, f64), (f64, f64)) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for &(x, y) in points {
        if x.is_finite() {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
        }
        if y.is_finite() {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }

    if x_min > x_max {
        x_min = 0.0;
        x_max = 0.0;
    }
    if y_min > y_max {
        y_min = 0.0;
        y_max = 0.0;
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    ((x_min, x_max), (y_min, y_max))
}

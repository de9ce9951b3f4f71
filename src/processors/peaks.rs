//! Discharge-capacity peak detection and propagation.
//!
//! Full reference discharges only happen during test cycles, so peaks are
//! searched for in the test subsequence alone. Each accepted peak is then
//! pinned to the row of the full series closest to it in time, and the
//! peak values are interpolated over time to give every row an estimate
//! of the cell's true capacity.
//!
//! # Algorithm
//!
//! 1. Collect local maxima (`v[i-1] < v[i] > v[i+1]`, plateau midpoints
//!    for flat tops)
//! 2. Drop candidates below `min_height`
//! 3. Single pass in index order: a candidate closer than `min_distance`
//!    samples to the last accepted peak is suppressed

use crate::config::PeakConfig;
use crate::core::transforms::{backward_fill, forward_fill, interpolate_by_time, nearest_by_time};

use super::classifier::Partition;

/// A detected capacity peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakRecord {
    /// Position within the test subsequence.
    pub index: usize,
    /// Row in the full series the peak was pinned to.
    pub row: usize,
    /// Time of the peak sample.
    pub time_s: f64,
    /// Discharge capacity at the peak.
    pub value: f64,
}

/// Indices of local maxima, with flat tops reduced to their midpoint.
///
/// The first and last samples are never peaks. NaN never compares greater,
/// so it never forms or borders a peak.
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut maxima = Vec::new();
    if n < 3 {
        return maxima;
    }

    let mut i = 1;
    while i < n - 1 {
        if values[i - 1] < values[i] {
            // walk to the end of a possible plateau
            let start = i;
            let mut end = i;
            while end + 1 < n - 1 && values[end + 1] == values[i] {
                end += 1;
            }
            if values[end + 1] < values[end] {
                maxima.push((start + end) / 2);
                i = end + 1;
                continue;
            }
            i = end;
        }
        i += 1;
    }

    maxima
}

/// Greedy height/distance peak selection.
///
/// Returns peak indices in ascending order. Accepted peaks are never
/// revisited, so every returned pair is at least `min_distance` apart. A
/// `min_distance` of 0 or 1 disables distance suppression.
pub fn find_peaks(values: &[f64], min_height: f64, min_distance: usize) -> Vec<usize> {
    let mut accepted: Vec<usize> = Vec::new();

    for idx in local_maxima(values) {
        if values[idx] < min_height {
            continue;
        }

        match accepted.last() {
            Some(&last) if idx - last < min_distance => {}
            _ => accepted.push(idx),
        }
    }

    accepted
}

/// Detect peaks in the test rows and pin each one to the full series.
pub fn extract_peaks(
    time_s: &[f64],
    q_discharge: &[f64],
    partition: &Partition,
    config: &PeakConfig,
) -> Vec<PeakRecord> {
    let test_time = partition.test_values(time_s);
    let test_q = partition.test_values(q_discharge);

    find_peaks(&test_q, config.min_height, config.min_distance)
        .into_iter()
        .filter_map(|index| {
            let time = test_time[index];
            let row = nearest_by_time(time_s, time)?;
            Some(PeakRecord {
                index,
                row,
                time_s: time,
                value: test_q[index],
            })
        })
        .collect()
}

/// Spread peak values over the full series.
///
/// Peaks are written at their pinned rows (a later peak overwrites an
/// earlier one on the same row), interpolated linearly in time between
/// consecutive pinned rows, then filled backward and forward to the ends.
/// With no peaks every row is `fallback`.
pub fn propagate_peaks(time_s: &[f64], peaks: &[PeakRecord], fallback: Option<f64>) -> Vec<Option<f64>> {
    if peaks.is_empty() {
        return vec![fallback; time_s.len()];
    }

    let mut pinned: Vec<Option<f64>> = vec![None; time_s.len()];
    for peak in peaks {
        pinned[peak.row] = Some(peak.value);
    }

    let interpolated = interpolate_by_time(time_s, &pinned);
    forward_fill(&backward_fill(&interpolated))
}

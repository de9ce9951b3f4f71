//! Pure series operations shared by the pipeline stages.
//!
//! Every function takes slices and returns freshly allocated vectors; none
//! of them mutate their input. Missing values are modelled as `Option`.

/// First difference of an integer series.
///
/// Element `k` of the result is `values[k + 1] - values[k]`, i.e. the change
/// arriving at row `k + 1`. The result is one shorter than the input and
/// empty for inputs of length 0 or 1.
pub fn first_difference(values: &[i64]) -> Vec<i64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Propagate the last defined value forward over gaps.
///
/// Leading gaps (before the first defined value) stay undefined.
pub fn forward_fill<T: Copy>(values: &[Option<T>]) -> Vec<Option<T>> {
    let mut last = None;
    values
        .iter()
        .map(|&v| {
            if v.is_some() {
                last = v;
            }
            last
        })
        .collect()
}

/// Propagate the next defined value backward over gaps.
///
/// Trailing gaps (after the last defined value) stay undefined.
pub fn backward_fill<T: Copy>(values: &[Option<T>]) -> Vec<Option<T>> {
    let mut next = None;
    let mut filled: Vec<Option<T>> = values
        .iter()
        .rev()
        .map(|&v| {
            if v.is_some() {
                next = v;
            }
            next
        })
        .collect();
    filled.reverse();
    filled
}

/// Index of the row whose time is closest to `target`.
///
/// Ties resolve to the first matching row. Non-finite times are skipped.
/// Returns `None` if no row has a finite time.
pub fn nearest_by_time(times: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, &t) in times.iter().enumerate() {
        if !t.is_finite() {
            continue;
        }
        let dist = (t - target).abs();
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((i, dist)),
        }
    }

    best.map(|(i, _)| i)
}

/// Linear interpolation between defined anchors, weighted by time.
///
/// For a gap row at time `t` between anchors `(t1, v1)` and `(t2, v2)` the
/// value is `v1 + (v2 - v1) * (t - t1) / (t2 - t1)`. Rows before the first
/// anchor and after the last one are left undefined. When two anchors share
/// the same time the left anchor's value is held across the gap.
pub fn interpolate_by_time(times: &[f64], values: &[Option<f64>]) -> Vec<Option<f64>> {
    debug_assert_eq!(times.len(), values.len(), "times and values must have same length");

    let mut out = values.to_vec();
    let anchors: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    for pair in anchors.windows(2) {
        let (left, right) = (pair[0], pair[1]);
        if right - left < 2 {
            continue;
        }

        let (t1, t2) = (times[left], times[right]);
        let (v1, v2) = match (values[left], values[right]) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        let span = t2 - t1;

        for i in (left + 1)..right {
            out[i] = if span != 0.0 && span.is_finite() {
                Some(v1 + (v2 - v1) * (times[i] - t1) / span)
            } else {
                Some(v1)
            };
        }
    }

    out
}

//! Write corrected regular-row numbers back into the full series.

use crate::core::transforms::{backward_fill, forward_fill};

use super::classifier::Partition;

/// Scatter corrected values to their regular positions.
///
/// Test positions are left undefined.
pub fn scatter_corrected(partition: &Partition, corrected: &[i64]) -> Vec<Option<i64>> {
    debug_assert_eq!(
        partition.regular.len(),
        corrected.len(),
        "one corrected value per regular row"
    );

    let mut merged = vec![None; partition.len()];
    for (&pos, &value) in partition.regular.iter().zip(corrected.iter()) {
        merged[pos] = Some(value);
    }
    merged
}

/// Merge corrected numbers into the full series and fill the gaps.
///
/// Gaps are filled forward first, then backward, so a test row inherits
/// the nearest preceding corrected value, or the following one at the very
/// start of the series. When there are no regular rows at all, nothing can
/// be propagated and `raw` is returned unchanged.
pub fn merge_and_fill(partition: &Partition, corrected: &[i64], raw: &[i64]) -> Vec<i64> {
    debug_assert_eq!(partition.len(), raw.len());

    if partition.regular.is_empty() {
        log::warn!("No regular rows to renumber from; keeping raw cycle numbers");
        return raw.to_vec();
    }

    let merged = scatter_corrected(partition, corrected);
    let filled = backward_fill(&forward_fill(&merged));

    // at least one defined value exists, so every slot is now filled
    filled
        .into_iter()
        .zip(raw.iter())
        .map(|(value, &fallback)| value.unwrap_or(fallback))
        .collect()
}

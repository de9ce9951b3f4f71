//! Restore a monotone cycle numbering over the regular rows.
//!
//! Each time the counter drops by more than one, the amount it fell is
//! added to a running offset so that the corrected count resumes where the
//! previous run ended. Successive drops compound.

use crate::core::transforms::first_difference;

/// Corrected numbering for the regular subsequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Renumbering {
    /// Corrected cycle number for each regular row, in subsequence order.
    pub corrected: Vec<i64>,
    /// Final value of the correction offset.
    pub offset: i64,
    /// Number of drops that contributed to the offset.
    pub corrections: usize,
}

/// Renumber a regular cycle sequence.
///
/// The offset starts at zero and only ever grows: at every row `i` with
/// `cycles[i] - cycles[i - 1] < -1` it increases by
/// `cycles[i - 1] - cycles[i]`. The corrected value at row `i` is
/// `cycles[i] + offset`.
pub fn renumber(cycles: &[i64]) -> Renumbering {
    let mut corrected = Vec::with_capacity(cycles.len());
    let mut offset = 0i64;
    let mut corrections = 0usize;

    if let Some(&first) = cycles.first() {
        corrected.push(first);
    }

    for (k, diff) in first_difference(cycles).into_iter().enumerate() {
        let i = k + 1;
        if diff < -1 {
            offset += -diff;
            corrections += 1;
            log::debug!(
                "Cycle drop at regular row {}: {} -> {}, offset now {}",
                i,
                cycles[i - 1],
                cycles[i],
                offset
            );
        }
        corrected.push(cycles[i] + offset);
    }

    Renumbering {
        corrected,
        offset,
        corrections,
    }
}

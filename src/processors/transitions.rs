//! Detection of backward and forward jumps in the raw cycle counter.
//!
//! A cycler that is stopped and resumed for a reference test restarts its
//! counter from an earlier value (a drop), and the counter often skips
//! ahead when routine cycling resumes (a rise). The cycle numbers on either
//! side of these jumps mark the reference ("test") cycles.

use std::collections::BTreeSet;

use crate::core::transforms::first_difference;

/// Set of cycle numbers flagged as test cycles.
///
/// Membership is all that matters; the ordered backing set only keeps
/// logs and reports deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalySet {
    cycles: BTreeSet<i64>,
}

impl AnomalySet {
    /// Creates the seed set `{0}`.
    pub fn new() -> Self {
        let mut cycles = BTreeSet::new();
        cycles.insert(0);
        Self { cycles }
    }

    /// Adds a cycle number; duplicates are ignored.
    #[inline]
    pub fn insert(&mut self, cycle: i64) {
        self.cycles.insert(cycle);
    }

    #[inline]
    pub fn contains(&self, cycle: i64) -> bool {
        self.cycles.contains(&cycle)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Flagged cycle numbers in ascending order.
    pub fn to_vec(&self) -> Vec<i64> {
        self.cycles.iter().copied().collect()
    }
}

impl Default for AnomalySet {
    fn default() -> Self {
        Self::new()
    }
}

/// Row positions of counter anomalies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transitions {
    /// Rows where the counter moved backward by more than one.
    pub drops: Vec<usize>,
    /// Rows where the counter skipped forward by more than one.
    pub rises: Vec<usize>,
}

/// Locate drops (`diff < -1`) and rises (`diff > 1`) in a cycle series.
///
/// Positions refer to the row that arrives after the jump, so they are
/// always at least 1.
pub fn find_transitions(cycles: &[i64]) -> Transitions {
    let mut transitions = Transitions::default();

    for (k, diff) in first_difference(cycles).into_iter().enumerate() {
        let row = k + 1;
        if diff < -1 {
            transitions.drops.push(row);
        } else if diff > 1 {
            transitions.rises.push(row);
        }
    }

    transitions
}

/// Build the test-cycle set from the anomalies in a cycle series.
///
/// For each drop at row `i` the cycle at `i` and the cycle at `i - 1` are
/// flagged. The first rise strictly after `i`, if any, contributes its
/// cycle `c` and `c + 1`.
pub fn detect_test_cycles(cycles: &[i64], transitions: &Transitions) -> AnomalySet {
    let mut anomalies = AnomalySet::new();

    for &drop in &transitions.drops {
        anomalies.insert(cycles[drop]);
        anomalies.insert(cycles[drop - 1]);

        // rises are in ascending row order
        let next = transitions.rises.partition_point(|&r| r <= drop);
        if let Some(&rise) = transitions.rises.get(next) {
            let rise_cycle = cycles[rise];
            anomalies.insert(rise_cycle);
            anomalies.insert(rise_cycle + 1);
        }
    }

    log::debug!(
        "{} drops, {} rises -> test cycles {:?}",
        transitions.drops.len(),
        transitions.rises.len(),
        anomalies.to_vec()
    );

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_transitions() {
        let cycles = vec![1, 2, 3, 1, 2, 5, 6, 6, 5];
        let t = find_transitions(&cycles);

        assert_eq!(t.drops, vec![3]);
        assert_eq!(t.rises, vec![5]);
    }

    #[test]
    fn test_unit_steps_are_not_anomalies() {
        let cycles = vec![0, 1, 2, 1, 2, 3];
        let t = find_transitions(&cycles);

        assert!(t.drops.is_empty());
        assert!(t.rises.is_empty());
    }

    #[test]
    fn test_no_drops_yields_seed_only() {
        let cycles = vec![0, 1, 2, 7, 8];
        let t = find_transitions(&cycles);
        let anomalies = detect_test_cycles(&cycles, &t);

        assert_eq!(anomalies.to_vec(), vec![0]);
    }

    #[test]
    fn test_drop_and_following_rise() {
        // resume at cycle 2 after 10, then skip from 3 to 12
        let cycles = vec![9, 10, 2, 3, 12, 13];
        let t = find_transitions(&cycles);
        let anomalies = detect_test_cycles(&cycles, &t);

        assert_eq!(anomalies.to_vec(), vec![0, 2, 10, 12, 13]);
    }

    #[test]
    fn test_rise_before_drop_is_ignored() {
        let cycles = vec![1, 5, 6, 2, 3];
        let t = find_transitions(&cycles);
        let anomalies = detect_test_cycles(&cycles, &t);

        assert_eq!(anomalies.to_vec(), vec![0, 2, 6]);
    }

    #[test]
    fn test_only_nearest_rise_is_paired() {
        let cycles = vec![5, 1, 4, 9, 20];
        let t = find_transitions(&cycles);
        let anomalies = detect_test_cycles(&cycles, &t);

        // rise at row 2 (cycle 4) is paired; rises at rows 3 and 4 are not
        assert!(anomalies.contains(4));
        assert!(anomalies.contains(5));
        assert!(!anomalies.contains(9));
        assert!(!anomalies.contains(20));
    }

    #[test]
    fn test_rise_on_last_row() {
        let cycles = vec![4, 1, 8];
        let t = find_transitions(&cycles);
        let anomalies = detect_test_cycles(&cycles, &t);

        assert_eq!(anomalies.to_vec(), vec![0, 1, 4, 8, 9]);
    }

    #[test]
    fn test_anomaly_set_dedups() {
        let mut set = AnomalySet::new();
        set.insert(3);
        set.insert(3);
        set.insert(0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_and_single_row() {
        assert_eq!(find_transitions(&[]), Transitions::default());
        let t = find_transitions(&[42]);
        assert_eq!(detect_test_cycles(&[42], &t).to_vec(), vec![0]);
    }
}

//! Split rows into routine ("regular") and reference ("test") cycles.

use super::transitions::AnomalySet;

/// Disjoint, exhaustive split of row positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Per-row test flag, indexed by row position.
    pub is_test: Vec<bool>,
    /// Positions of regular rows, in acquisition order.
    pub regular: Vec<usize>,
    /// Positions of test rows, in acquisition order.
    pub test: Vec<usize>,
}

impl Partition {
    /// Total number of rows covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.is_test.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.is_test.is_empty()
    }

    /// Gather the values at regular positions, reindexed `0..n`.
    pub fn regular_values<T: Copy>(&self, values: &[T]) -> Vec<T> {
        self.regular.iter().map(|&i| values[i]).collect()
    }

    /// Gather the values at test positions, reindexed `0..n`.
    pub fn test_values<T: Copy>(&self, values: &[T]) -> Vec<T> {
        self.test.iter().map(|&i| values[i]).collect()
    }
}

/// Flag every row whose cycle number is in the anomaly set.
pub fn classify(cycles: &[i64], anomalies: &AnomalySet) -> Partition {
    let is_test: Vec<bool> = cycles.iter().map(|&c| anomalies.contains(c)).collect();

    let mut regular = Vec::with_capacity(cycles.len());
    let mut test = Vec::new();
    for (i, &flag) in is_test.iter().enumerate() {
        if flag {
            test.push(i);
        } else {
            regular.push(i);
        }
    }

    log::debug!("{} regular rows, {} test rows", regular.len(), test.len());

    Partition {
        is_test,
        regular,
        test,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn anomalies(cycles: &[i64]) -> AnomalySet {
        let mut set = AnomalySet::new();
        for &c in cycles {
            set.insert(c);
        }
        set
    }

    #[test]
    fn test_classify_by_membership() {
        let cycles = vec![0, 0, 1, 2, 3, 3, 4];
        let partition = classify(&cycles, &anomalies(&[3]));

        assert_eq!(
            partition.is_test,
            vec![true, true, false, false, true, true, false]
        );
        assert_eq!(partition.regular, vec![2, 3, 6]);
        assert_eq!(partition.test, vec![0, 1, 4, 5]);
    }

    #[test]
    fn test_partition_is_exact() {
        let cycles: Vec<i64> = (0..50).map(|i| i % 7).collect();
        let partition = classify(&cycles, &anomalies(&[2, 5]));

        assert_eq!(partition.regular.len() + partition.test.len(), cycles.len());

        let regular: HashSet<usize> = partition.regular.iter().copied().collect();
        let test: HashSet<usize> = partition.test.iter().copied().collect();
        assert!(regular.is_disjoint(&test));
        assert_eq!(regular.union(&test).count(), cycles.len());
    }

    #[test]
    fn test_subsequence_gathering() {
        let cycles = vec![0, 1, 2, 0];
        let partition = classify(&cycles, &AnomalySet::new());
        let times = vec![10.0, 11.0, 12.0, 13.0];

        assert_eq!(partition.regular_values(&times), vec![11.0, 12.0]);
        assert_eq!(partition.test_values(&times), vec![10.0, 13.0]);
    }
}

//! Sorted Feature Index
//!
//! Per-feature orderings of a node's data points by value. An index enumerates the
//! candidate thresholds between distinct values and partitions ids without ever
//! sorting again. Dense features keep every id; sparse features keep only explicit
//! non-zero values and treat the zeros as one bucket.
pub mod dense;
pub mod sparse;

use crate::errors::SortForestError;
use dense::{DenseIndex, DenseRuns};
use serde::{Deserialize, Serialize};
use sparse::{SparseIndex, SparseRuns};
use std::borrow::Cow;

/// Order in which an index emits its threshold runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Lowest values first, each run lands on the `<=` side of its threshold.
    Forward,
    /// Highest values first, each run lands on the `>` side of its threshold.
    Backward,
}

/// Ids sharing one value, and the midpoint between that value and its neighbour
/// in the traversal direction.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdRun<'s> {
    pub ids: &'s [usize],
    pub threshold: f64,
}

/// Sorted index of one feature for one node.
#[derive(Debug, Clone)]
pub enum SortedIndex<'s> {
    Dense(DenseIndex<'s>),
    Sparse(Cow<'s, SparseIndex>),
}

impl<'s> SortedIndex<'s> {
    /// Number of ids in the node.
    pub fn len(&self) -> usize {
        match self {
            SortedIndex::Dense(d) => d.len(),
            SortedIndex::Sparse(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn direction(&self) -> Direction {
        match self {
            SortedIndex::Dense(_) => Direction::Forward,
            SortedIndex::Sparse(s) => s.direction(),
        }
    }

    /// Threshold runs in traversal order. The last run in that order is never emitted,
    /// so a feature with fewer than two distinct values yields nothing.
    pub fn runs(&self) -> Runs<'_> {
        match self {
            SortedIndex::Dense(d) => Runs::Dense(d.runs()),
            SortedIndex::Sparse(s) => Runs::Sparse(s.runs()),
        }
    }

    /// Candidate thresholds, strictly increasing regardless of traversal direction.
    pub fn threshold_values(&self) -> Vec<f64> {
        let mut thresholds: Vec<f64> = self.runs().map(|r| r.threshold).collect();
        if self.direction() == Direction::Backward {
            thresholds.reverse();
        }
        thresholds
    }

    /// Partition the node's ids into `value <= threshold` and `value > threshold`.
    ///
    /// `active` holds the node's ids; sparse indexes use it to recover zeros.
    pub fn split_by_threshold(&self, active: &[usize], threshold: f64) -> Result<(Vec<usize>, Vec<usize>), SortForestError> {
        match self {
            SortedIndex::Dense(d) => Ok(d.split_by_threshold(threshold)),
            SortedIndex::Sparse(s) => s.split_by_threshold(active, threshold),
        }
    }
}

pub enum Runs<'s> {
    Dense(DenseRuns<'s>),
    Sparse(SparseRuns<'s>),
}

impl<'s> Iterator for Runs<'s> {
    type Item = ThresholdRun<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Runs::Dense(r) => r.next(),
            Runs::Sparse(r) => r.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::dense::DenseColumn;
    use super::*;
    use crate::data::Column;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force(values: &[f64], active: &[usize], threshold: f64) -> (Vec<usize>, Vec<usize>) {
        let mut le: Vec<usize> = active.iter().copied().filter(|i| values[*i] <= threshold).collect();
        let mut gt: Vec<usize> = active.iter().copied().filter(|i| values[*i] > threshold).collect();
        le.sort_unstable();
        gt.sort_unstable();
        (le, gt)
    }

    fn sorted_copy(mut v: Vec<usize>) -> Vec<usize> {
        v.sort_unstable();
        v
    }

    #[test]
    fn test_thresholds_strictly_increasing() {
        let values = vec![0.0, 0.0, 3.0, 3.0, 5.0, 5.0];
        let col = DenseColumn::build(Cow::Borrowed(values.as_slice()), &[0, 1, 2, 3, 4, 5]);
        let index = SortedIndex::Dense(col.index());
        assert_eq!(index.threshold_values(), vec![1.5, 4.0]);
        let (le, gt) = index.split_by_threshold(&[], 1.5).unwrap();
        assert_eq!(le, vec![0, 1]);
        assert_eq!(gt, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_backward_thresholds_ascending() {
        let rows = vec![0, 2, 3];
        let values = vec![1.0, 4.0, 2.0];
        let index = SparseIndex::build(Column::Sparse { rows: &rows, values: &values }, &[0, 1, 2, 3], 4).unwrap();
        let index = SortedIndex::Sparse(Cow::Owned(index));
        assert_eq!(index.direction(), Direction::Backward);
        assert_eq!(index.threshold_values(), vec![0.5, 1.5, 3.0]);
    }

    #[test]
    fn test_dense_and_sparse_agree() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 60;
        for trial in 0..40 {
            // Mix of negative, zero and positive values with frequent ties.
            let values: Vec<f64> = (0..n)
                .map(|_| {
                    if rng.gen::<f64>() < 0.5 {
                        0.0
                    } else {
                        (rng.gen_range(-4..5) as f64) * 0.5
                    }
                })
                .collect();
            let active: Vec<usize> = (0..n).filter(|_| rng.gen::<f64>() < 0.7).collect();

            let dense_col = DenseColumn::build(Cow::Borrowed(values.as_slice()), &active);
            let dense = SortedIndex::Dense(dense_col.index());
            let sparse = SortedIndex::Sparse(Cow::Owned(
                SparseIndex::build(Column::Dense(&values), &active, n).unwrap(),
            ));

            let thresholds = dense.threshold_values();
            assert_eq!(thresholds, sparse.threshold_values(), "trial {}", trial);
            assert!(thresholds.windows(2).all(|w| w[0] < w[1]));

            for t in thresholds {
                let d = dense.split_by_threshold(&active, t).unwrap();
                let s = sparse.split_by_threshold(&active, t).unwrap();
                assert_eq!(d, s, "trial {} threshold {}", trial, t);
                let (le, gt) = brute_force(&values, &active, t);
                assert_eq!(sorted_copy(d.0), le);
                assert_eq!(sorted_copy(d.1), gt);
            }

            // Runs cover every id except the never-emitted final run.
            let covered: usize = sparse.runs().map(|r| r.ids.len()).sum();
            assert!(covered <= active.len());
        }
    }

    fn next_up(v: f64) -> f64 {
        f64::from_bits(v.to_bits() + 1)
    }

    #[test]
    fn test_thresholds_separate_extreme_values() {
        let a = 1.0000000000000002;
        let tiny = f64::from_bits(1);
        let columns = vec![
            vec![1e308, 1.7e308, 1.7e308, f64::MAX, -f64::MAX, 1e308],
            vec![a, next_up(a), next_up(next_up(a)), a, -0.5, next_up(a)],
            vec![f64::NEG_INFINITY, -1.0, 0.0, 2.0, f64::INFINITY, 0.0, f64::INFINITY],
            vec![f64::NEG_INFINITY, -f64::MAX, f64::MAX, f64::INFINITY],
            // Zero is the minimum here, so the sparse index runs backward.
            vec![0.0, 0.0, tiny, next_up(tiny), f64::MAX, f64::INFINITY],
        ];
        for (c, values) in columns.iter().enumerate() {
            let active: Vec<usize> = (0..values.len()).collect();
            let dense_col = DenseColumn::build(Cow::Borrowed(values.as_slice()), &active);
            let dense = SortedIndex::Dense(dense_col.index());
            let sparse = SortedIndex::Sparse(Cow::Owned(
                SparseIndex::build(Column::Dense(values), &active, values.len()).unwrap(),
            ));
            let mut distinct = values.clone();
            distinct.sort_by(|x, y| x.partial_cmp(y).unwrap());
            distinct.dedup();

            for index in [&dense, &sparse] {
                let thresholds = index.threshold_values();
                assert_eq!(thresholds.len(), distinct.len() - 1, "column {}", c);
                assert!(thresholds.windows(2).all(|w| w[0] < w[1]), "column {}: {:?}", c, thresholds);
                assert!(thresholds.iter().all(|t| !t.is_nan()));

                let mut covered = 0;
                for run in index.runs() {
                    covered += run.ids.len();
                    let (le, gt) = index.split_by_threshold(&active, run.threshold).unwrap();
                    let side = match index.direction() {
                        Direction::Forward => le.len(),
                        Direction::Backward => gt.len(),
                    };
                    assert_eq!(side, covered, "column {} threshold {}", c, run.threshold);
                    let (bf_le, bf_gt) = brute_force(values, &active, run.threshold);
                    assert_eq!(sorted_copy(le), bf_le);
                    assert_eq!(sorted_copy(gt), bf_gt);
                }
            }
            assert_eq!(dense.threshold_values(), sparse.threshold_values(), "column {}", c);
        }
        let backward = SparseIndex::build(Column::Dense(&columns[4]), &[0, 1, 2, 3, 4, 5], 6).unwrap();
        assert_eq!(backward.direction(), Direction::Backward);
    }

    #[test]
    fn test_partitioned_indexes_agree() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 50;
        let values: Vec<f64> = (0..n)
            .map(|_| {
                if rng.gen::<f64>() < 0.6 {
                    0.0
                } else {
                    rng.gen_range(-3..4) as f64
                }
            })
            .collect();
        let active: Vec<usize> = (0..n).collect();
        let is_yes: Vec<bool> = (0..n).map(|_| rng.gen::<f64>() < 0.4).collect();
        let yes_count = is_yes.iter().filter(|y| **y).count();

        let dense_col = DenseColumn::build(Cow::Borrowed(values.as_slice()), &active);
        let sparse = SparseIndex::build(Column::Dense(&values), &active, n).unwrap();
        let (sparse_yes, sparse_no) = sparse.partition(&is_yes, yes_count).unwrap();

        let mut order = dense_col.order().to_vec();
        let mut scratch = Vec::new();
        dense::partition(&mut order, &is_yes, yes_count, &mut scratch).unwrap();
        let (yes_ids, no_ids) = order.split_at(yes_count);

        let pairs = [(yes_ids, sparse_yes), (no_ids, sparse_no)];
        for (ids, sparse_side) in pairs.iter() {
            let ids: &[usize] = ids;
            let d = SortedIndex::Dense(DenseIndex::new(Cow::Borrowed(ids), &values));
            let s = SortedIndex::Sparse(Cow::Borrowed(sparse_side));
            assert_eq!(d.threshold_values(), s.threshold_values());
            for t in d.threshold_values() {
                assert_eq!(d.split_by_threshold(ids, t).unwrap(), s.split_by_threshold(ids, t).unwrap());
            }
        }
    }
}

use super::{Direction, ThresholdRun};
use crate::data::Column;
use crate::errors::SortForestError;
use crate::utils::{id_mask, midpoint};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Entry standing for every implicit zero of the index.
pub(crate) const ZERO_SLOT: usize = usize::MAX;

/// Sorted index of one sparse feature over one node's ids.
///
/// Only explicit non-zero values are stored, sorted by value then id. When the
/// node has implicit zeros a single [`ZERO_SLOT`] entry sits where zero sorts.
/// Zero ids themselves are kept only when that slot is strictly inside the
/// sorted range; otherwise traversal is arranged so that the zero bucket is the
/// final run, which is never emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseIndex {
    entries: Vec<usize>,
    values: Vec<f64>,
    zeros: Option<Vec<usize>>,
    zero_count: usize,
    direction: Direction,
    data_num: usize,
}

impl SparseIndex {
    /// Index the values of `column` restricted to the distinct ids in `active`.
    pub fn build(column: Column<'_>, active: &[usize], n_rows: usize) -> Result<Self, SortForestError> {
        let (mask, count) = id_mask(active, n_rows);
        let mut pairs: Vec<(usize, f64)> = match column {
            Column::Dense(values) => active
                .iter()
                .filter(|i| values[**i] != 0.0)
                .map(|i| (*i, values[*i]))
                .collect(),
            Column::Sparse { rows, values } => rows
                .iter()
                .zip(values.iter())
                .filter(|(r, v)| mask[**r] && **v != 0.0)
                .map(|(r, v)| (*r, *v))
                .collect(),
        };
        pairs.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

        let zero_count = count - pairs.len();
        let mut non_zero: Vec<usize> = pairs.iter().map(|(id, _)| *id).collect();
        non_zero.sort_unstable();
        SparseIndex::assemble(pairs, zero_count, count, move || {
            let mut zeros: Vec<usize> = active
                .iter()
                .copied()
                .filter(|id| non_zero.binary_search(id).is_err())
                .collect();
            zeros.sort_unstable();
            Ok(zeros)
        })
    }

    fn assemble<F>(pairs: Vec<(usize, f64)>, zero_count: usize, data_num: usize, zeros: F) -> Result<Self, SortForestError>
    where
        F: FnOnce() -> Result<Vec<usize>, SortForestError>,
    {
        let n = pairs.len();
        let negatives = pairs.partition_point(|(_, v)| *v < 0.0);
        let mut entries = Vec::with_capacity(n + 1);
        let mut values = Vec::with_capacity(n + 1);
        for (i, (id, v)) in pairs.into_iter().enumerate() {
            if i == negatives && zero_count > 0 {
                entries.push(ZERO_SLOT);
                values.push(0.0);
            }
            entries.push(id);
            values.push(v);
        }
        if negatives == n && zero_count > 0 {
            entries.push(ZERO_SLOT);
            values.push(0.0);
        }

        let zero_pos = entries.iter().position(|e| *e == ZERO_SLOT);
        let direction = if zero_pos == Some(0) {
            Direction::Backward
        } else {
            Direction::Forward
        };
        let interior = matches!(zero_pos, Some(p) if p > 0 && p + 1 < entries.len());
        let zeros = if interior {
            let z = zeros()?;
            if z.len() != zero_count {
                return Err(SortForestError::inconsistent(
                    "sparse index",
                    format!("expected {} zero ids, found {}", zero_count, z.len()),
                ));
            }
            Some(z)
        } else {
            None
        };

        Ok(SparseIndex {
            entries,
            values,
            zeros,
            zero_count,
            direction,
            data_num,
        })
    }

    /// Number of ids indexed, zeros included.
    pub fn len(&self) -> usize {
        self.data_num
    }

    pub fn is_empty(&self) -> bool {
        self.data_num == 0
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn zero_count(&self) -> usize {
        self.zero_count
    }

    pub fn non_zero_count(&self) -> usize {
        self.data_num - self.zero_count
    }

    /// Zero ids, present only when zero sorts strictly between explicit values.
    pub fn materialized_zeros(&self) -> Option<&[usize]> {
        self.zeros.as_deref()
    }

    pub fn runs(&self) -> SparseRuns<'_> {
        SparseRuns {
            index: self,
            lo: 0,
            hi: self.entries.len(),
        }
    }

    fn group_ids(&self, start: usize, end: usize) -> &[usize] {
        if self.entries[start] == ZERO_SLOT {
            self.zeros.as_deref().unwrap_or(&[])
        } else {
            &self.entries[start..end]
        }
    }

    fn implicit_zeros(&self, active: &[usize]) -> Result<Vec<usize>, SortForestError> {
        if active.len() != self.data_num {
            return Err(SortForestError::inconsistent(
                "split_by_threshold",
                format!("index holds {} ids but {} active ids were given", self.data_num, active.len()),
            ));
        }
        let mut non_zero: Vec<usize> = self.entries.iter().copied().filter(|e| *e != ZERO_SLOT).collect();
        non_zero.sort_unstable();
        let mut zeros: Vec<usize> = active
            .iter()
            .copied()
            .filter(|id| non_zero.binary_search(id).is_err())
            .collect();
        zeros.sort_unstable();
        if zeros.len() != self.zero_count {
            return Err(SortForestError::inconsistent(
                "split_by_threshold",
                format!("expected {} zero ids, found {}", self.zero_count, zeros.len()),
            ));
        }
        Ok(zeros)
    }

    /// Ids with value `<= threshold` and the rest, each in ascending value order.
    ///
    /// `active` is the node's id set, used to recover zero ids that are not kept.
    pub fn split_by_threshold(&self, active: &[usize], threshold: f64) -> Result<(Vec<usize>, Vec<usize>), SortForestError> {
        let zeros: Cow<[usize]> = match (&self.zeros, self.zero_count) {
            (_, 0) => Cow::Owned(Vec::new()),
            (Some(z), _) => Cow::Borrowed(z.as_slice()),
            (None, _) => Cow::Owned(self.implicit_zeros(active)?),
        };
        let mut le = Vec::new();
        let mut gt = Vec::new();
        for (id, v) in self.entries.iter().zip(self.values.iter()) {
            if *id == ZERO_SLOT {
                if 0.0 <= threshold {
                    le.extend_from_slice(&zeros);
                } else {
                    gt.extend_from_slice(&zeros);
                }
            } else if *v <= threshold {
                le.push(*id);
            } else {
                gt.push(*id);
            }
        }
        Ok((le, gt))
    }

    fn select(&self, is_yes: &[bool], want: bool, count: usize) -> Result<SparseIndex, SortForestError> {
        let pairs: Vec<(usize, f64)> = self
            .entries
            .iter()
            .zip(self.values.iter())
            .filter(|(id, _)| **id != ZERO_SLOT && is_yes[**id] == want)
            .map(|(id, v)| (*id, *v))
            .collect();
        if pairs.len() > count {
            return Err(SortForestError::inconsistent(
                "separate",
                format!("{} non-zero ids selected for a side of {}", pairs.len(), count),
            ));
        }
        let zero_count = count - pairs.len();
        if zero_count > self.zero_count {
            return Err(SortForestError::inconsistent(
                "separate",
                format!("{} zero ids needed but only {} available", zero_count, self.zero_count),
            ));
        }
        let zeros: Option<Vec<usize>> = self
            .zeros
            .as_ref()
            .map(|z| z.iter().copied().filter(|id| is_yes[*id] == want).collect());
        if let Some(z) = &zeros {
            if z.len() != zero_count {
                return Err(SortForestError::inconsistent(
                    "separate",
                    format!("expected {} zero ids, found {}", zero_count, z.len()),
                ));
            }
        }
        SparseIndex::assemble(pairs, zero_count, count, move || {
            zeros.ok_or_else(|| SortForestError::inconsistent("separate", "zero ids were not kept by the parent index"))
        })
    }

    /// Split into the ids marked in `is_yes` and the rest.
    pub fn partition(&self, is_yes: &[bool], yes_count: usize) -> Result<(SparseIndex, SparseIndex), SortForestError> {
        if yes_count > self.data_num {
            return Err(SortForestError::inconsistent(
                "separate",
                format!("{} ids selected from an index of {}", yes_count, self.data_num),
            ));
        }
        let yes = self.select(is_yes, true, yes_count)?;
        let no = self.select(is_yes, false, self.data_num - yes_count)?;
        Ok((yes, no))
    }

    /// Only the ids marked in `is_yes`.
    pub fn filter(&self, is_yes: &[bool], yes_count: usize) -> Result<SparseIndex, SortForestError> {
        if yes_count > self.data_num {
            return Err(SortForestError::inconsistent(
                "filter",
                format!("{} ids selected from an index of {}", yes_count, self.data_num),
            ));
        }
        self.select(is_yes, true, yes_count)
    }
}

/// Runs of a sparse index in its traversal direction.
pub struct SparseRuns<'s> {
    index: &'s SparseIndex,
    lo: usize,
    hi: usize,
}

impl<'s> Iterator for SparseRuns<'s> {
    type Item = ThresholdRun<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.lo >= self.hi {
            return None;
        }
        let index = self.index;
        let values = &index.values;
        match index.direction {
            Direction::Forward => {
                let start = self.lo;
                let v = values[start];
                let mut end = start + 1;
                while end < self.hi && values[end] == v {
                    end += 1;
                }
                if end >= self.hi {
                    self.lo = self.hi;
                    return None;
                }
                self.lo = end;
                Some(ThresholdRun {
                    ids: index.group_ids(start, end),
                    threshold: midpoint(v, values[end]),
                })
            }
            Direction::Backward => {
                let end = self.hi;
                let v = values[end - 1];
                let mut start = end - 1;
                while start > self.lo && values[start - 1] == v {
                    start -= 1;
                }
                if start == self.lo {
                    self.hi = self.lo;
                    return None;
                }
                self.hi = start;
                Some(ThresholdRun {
                    ids: index.group_ids(start, end),
                    threshold: midpoint(values[start - 1], v),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_column<'a>(rows: &'a [usize], values: &'a [f64]) -> Column<'a> {
        Column::Sparse { rows, values }
    }

    #[test]
    fn test_zero_in_the_middle() {
        let rows = vec![2, 7];
        let values = vec![-1.0, 2.0];
        let active: Vec<usize> = (0..10).collect();
        let index = SparseIndex::build(sparse_column(&rows, &values), &active, 10).unwrap();
        assert_eq!(index.direction(), Direction::Forward);
        assert_eq!(index.zero_count(), 8);
        assert_eq!(index.materialized_zeros(), Some(&[0, 1, 3, 4, 5, 6, 8, 9][..]));

        let runs: Vec<_> = index.runs().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].ids, &[2]);
        assert_eq!(runs[0].threshold, -0.5);
        assert_eq!(runs[1].ids.len(), 8);
        assert_eq!(runs[1].threshold, 1.0);

        let (le, gt) = index.split_by_threshold(&active, 0.0).unwrap();
        assert_eq!(le, vec![2, 0, 1, 3, 4, 5, 6, 8, 9]);
        assert_eq!(gt, vec![7]);
    }

    #[test]
    fn test_all_positive_runs_backward() {
        let rows = vec![1, 3, 4];
        let values = vec![2.0, 1.0, 2.0];
        let active: Vec<usize> = (0..6).collect();
        let index = SparseIndex::build(sparse_column(&rows, &values), &active, 6).unwrap();
        assert_eq!(index.direction(), Direction::Backward);
        assert!(index.materialized_zeros().is_none());

        let runs: Vec<_> = index.runs().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].ids, &[1, 4]);
        assert_eq!(runs[0].threshold, 1.5);
        assert_eq!(runs[1].ids, &[3]);
        assert_eq!(runs[1].threshold, 0.5);

        let (le, gt) = index.split_by_threshold(&active, 0.5).unwrap();
        assert_eq!(le, vec![0, 2, 5]);
        assert_eq!(gt, vec![3, 1, 4]);
    }

    #[test]
    fn test_all_negative_runs_forward() {
        let rows = vec![0, 2];
        let values = vec![-3.0, -1.0];
        let active = vec![0, 1, 2, 3];
        let index = SparseIndex::build(sparse_column(&rows, &values), &active, 4).unwrap();
        assert_eq!(index.direction(), Direction::Forward);
        assert!(index.materialized_zeros().is_none());
        let thresholds: Vec<f64> = index.runs().map(|r| r.threshold).collect();
        assert_eq!(thresholds, vec![-2.0, -0.5]);
    }

    #[test]
    fn test_dense_column_input() {
        let values = vec![0.0, -1.0, 0.0, 4.0];
        let index = SparseIndex::build(Column::Dense(&values), &[0, 1, 3], 4).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.zero_count(), 1);
        assert_eq!(index.materialized_zeros(), Some(&[0][..]));
    }

    #[test]
    fn test_partition() {
        let rows = vec![2, 7];
        let values = vec![-1.0, 2.0];
        let active: Vec<usize> = (0..10).collect();
        let index = SparseIndex::build(sparse_column(&rows, &values), &active, 10).unwrap();

        let mut is_yes = vec![false; 10];
        for id in [0, 1, 7] {
            is_yes[id] = true;
        }
        let (yes, no) = index.partition(&is_yes, 3).unwrap();
        assert_eq!(yes.len(), 3);
        assert_eq!(yes.zero_count(), 2);
        // Zero is now the smallest value on the yes side.
        assert_eq!(yes.direction(), Direction::Backward);
        assert!(yes.materialized_zeros().is_none());
        assert_eq!(no.len(), 7);
        assert_eq!(no.zero_count(), 6);
        // Zero is the largest value on the no side.
        assert_eq!(no.direction(), Direction::Forward);
        let (le, gt) = no.split_by_threshold(&[2, 3, 4, 5, 6, 8, 9], -0.5).unwrap();
        assert_eq!(le, vec![2]);
        assert_eq!(gt, vec![3, 4, 5, 6, 8, 9]);

        assert!(index.partition(&is_yes, 4).is_err());
    }

    #[test]
    fn test_split_checks_active_ids() {
        let rows = vec![1];
        let values = vec![1.0];
        let index = SparseIndex::build(sparse_column(&rows, &values), &[0, 1, 2], 3).unwrap();
        assert!(index.split_by_threshold(&[0, 1], 0.5).is_err());
    }
}

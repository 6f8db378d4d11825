use super::ThresholdRun;
use crate::errors::SortForestError;
use crate::utils::{midpoint, stable_partition};
use std::borrow::Cow;
use std::cmp::Ordering;

/// All values of one feature plus the ids of the data-level active set sorted by them.
#[derive(Debug, Clone)]
pub struct DenseColumn<'a> {
    values: Cow<'a, [f64]>,
    order: Vec<usize>,
}

impl<'a> DenseColumn<'a> {
    /// Sort `active` by value ascending, ties by id. Values must not be NaN.
    pub fn build(values: Cow<'a, [f64]>, active: &[usize]) -> Self {
        let mut order = active.to_vec();
        order.sort_by(|a, b| {
            values[*a]
                .partial_cmp(&values[*b])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(b))
        });
        DenseColumn { values, order }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn index(&self) -> DenseIndex<'_> {
        DenseIndex::new(Cow::Borrowed(self.order.as_slice()), &self.values)
    }
}

/// Ids of one node sorted by one feature's value.
#[derive(Debug, Clone)]
pub struct DenseIndex<'s> {
    ids: Cow<'s, [usize]>,
    values: &'s [f64],
}

impl<'s> DenseIndex<'s> {
    pub fn new(ids: Cow<'s, [usize]>, values: &'s [f64]) -> Self {
        DenseIndex { ids, values }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    /// One run per boundary between distinct values, lowest first.
    pub fn runs(&self) -> DenseRuns<'_> {
        DenseRuns {
            ids: &self.ids,
            values: self.values,
            pos: 0,
        }
    }

    /// Ids with value `<= threshold` and the rest, both in sorted order.
    pub fn split_by_threshold(&self, threshold: f64) -> (Vec<usize>, Vec<usize>) {
        let cut = self
            .ids
            .iter()
            .position(|id| self.values[*id] > threshold)
            .unwrap_or(self.ids.len());
        (self.ids[..cut].to_vec(), self.ids[cut..].to_vec())
    }

    /// The ids marked in `is_yes`, still sorted. `yes_count` must match.
    pub fn filter(&self, is_yes: &[bool], yes_count: usize) -> Result<Vec<usize>, SortForestError> {
        let mut out = Vec::with_capacity(yes_count);
        out.extend(self.ids.iter().copied().filter(|id| is_yes[*id]));
        if out.len() != yes_count {
            return Err(SortForestError::inconsistent(
                "filter",
                format!("expected {} selected ids, found {}", yes_count, out.len()),
            ));
        }
        Ok(out)
    }
}

/// Stable in-place partition of one feature's window, selected ids first.
pub fn partition(window: &mut [usize], is_yes: &[bool], yes_count: usize, scratch: &mut Vec<usize>) -> Result<(), SortForestError> {
    let yes = stable_partition(window, is_yes, scratch);
    if yes != yes_count {
        return Err(SortForestError::inconsistent(
            "separate",
            format!("expected {} selected ids in window, found {}", yes_count, yes),
        ));
    }
    Ok(())
}

pub struct DenseRuns<'s> {
    ids: &'s [usize],
    values: &'s [f64],
    pos: usize,
}

impl<'s> Iterator for DenseRuns<'s> {
    type Item = ThresholdRun<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.ids.len();
        if self.pos >= n {
            return None;
        }
        let start = self.pos;
        let v = self.values[self.ids[start]];
        let mut end = start + 1;
        while end < n && self.values[self.ids[end]] == v {
            end += 1;
        }
        // The highest run has no boundary above it.
        if end >= n {
            self.pos = n;
            return None;
        }
        self.pos = end;
        Some(ThresholdRun {
            ids: &self.ids[start..end],
            threshold: midpoint(v, self.values[self.ids[end]]),
        })
    }
}

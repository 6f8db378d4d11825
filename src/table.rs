//! Feature Table
//!
//! One sorted index per feature. The data-level [`FeatureTable`] is built once from
//! the matrix. A tree copies (or, for a sampled root, filters) it into its
//! [`BaseTable`], and every node then refers to the base through a small
//! [`NodeTable`]: a window into the dense order buffers, its own sparse indexes,
//! or, in memory-tight mode, only the node's active set.
use crate::data::{Column, DataMatrix};
use crate::errors::SortForestError;
use crate::node::Window;
use crate::sorted::dense::{self, DenseColumn, DenseIndex};
use crate::sorted::sparse::SparseIndex;
use crate::sorted::SortedIndex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// How sorted indexes store a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Representation {
    Dense,
    Sparse,
}

enum Layout<'a> {
    Dense(Vec<DenseColumn<'a>>),
    Sparse(Vec<SparseIndex>),
}

/// Sorted indexes of every feature over one fixed set of ids.
pub struct FeatureTable<'a> {
    layout: Layout<'a>,
    data_num: usize,
    n_rows: usize,
}

fn reserve_order(len: usize) -> Result<Vec<usize>, SortForestError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|e| SortForestError::AllocationFailed(format!("an order buffer of {} ids: {}", len, e)))?;
    Ok(v)
}

impl<'a> FeatureTable<'a> {
    /// Sort the distinct ids in `active` for every column of `matrix`.
    pub fn bootstrap(
        matrix: &'a dyn DataMatrix,
        active: &[usize],
        representation: Representation,
    ) -> Result<Self, SortForestError> {
        let n_rows = matrix.rows();
        let layout = match representation {
            Representation::Dense => {
                let columns = (0..matrix.cols())
                    .map(|j| {
                        let values = match matrix.column(j) {
                            Column::Dense(v) => Cow::Borrowed(v),
                            sparse @ Column::Sparse { .. } => Cow::Owned(sparse.to_dense(n_rows)),
                        };
                        DenseColumn::build(values, active)
                    })
                    .collect();
                Layout::Dense(columns)
            }
            Representation::Sparse => {
                let indexes = (0..matrix.cols())
                    .map(|j| SparseIndex::build(matrix.column(j), active, n_rows))
                    .collect::<Result<Vec<_>, _>>()?;
                Layout::Sparse(indexes)
            }
        };
        Ok(FeatureTable {
            layout,
            data_num: active.len(),
            n_rows,
        })
    }

    pub fn representation(&self) -> Representation {
        match self.layout {
            Layout::Dense(_) => Representation::Dense,
            Layout::Sparse(_) => Representation::Sparse,
        }
    }

    pub fn n_features(&self) -> usize {
        match &self.layout {
            Layout::Dense(c) => c.len(),
            Layout::Sparse(s) => s.len(),
        }
    }

    /// Number of ids indexed.
    pub fn data_num(&self) -> usize {
        self.data_num
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Index of feature `fx` over every id of this table.
    pub fn sorted(&self, fx: usize) -> SortedIndex<'_> {
        match &self.layout {
            Layout::Dense(c) => SortedIndex::Dense(c[fx].index()),
            Layout::Sparse(s) => SortedIndex::Sparse(Cow::Borrowed(&s[fx])),
        }
    }

    fn dense_values(&self, fx: usize) -> Result<&[f64], SortForestError> {
        match &self.layout {
            Layout::Dense(c) => Ok(c[fx].values()),
            Layout::Sparse(_) => Err(SortForestError::inconsistent(
                "sorted",
                "dense node table over sparse data-level table",
            )),
        }
    }

    /// Private copy of the index buffers, so partitioning never disturbs this table.
    pub fn derive_base(&self) -> Result<BaseTable, SortForestError> {
        match &self.layout {
            Layout::Dense(columns) => {
                let mut orders = Vec::with_capacity(columns.len());
                for c in columns {
                    let mut order = reserve_order(c.order().len())?;
                    order.extend_from_slice(c.order());
                    orders.push(order);
                }
                Ok(BaseTable::Dense(orders))
            }
            Layout::Sparse(indexes) => Ok(BaseTable::Sparse(indexes.clone())),
        }
    }

    /// Base restricted to a sampled subset of ids, `count` of them marked in `sample`.
    pub fn filter_sampled(&self, sample: &[bool], count: usize) -> Result<BaseTable, SortForestError> {
        match &self.layout {
            Layout::Dense(columns) => {
                let mut orders = Vec::with_capacity(columns.len());
                for c in columns {
                    let mut order = reserve_order(count)?;
                    order.extend(c.index().filter(sample, count)?);
                    orders.push(order);
                }
                Ok(BaseTable::Dense(orders))
            }
            Layout::Sparse(indexes) => {
                let filtered = indexes
                    .iter()
                    .map(|s| s.filter(sample, count))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(BaseTable::Sparse(filtered))
            }
        }
    }
}

/// The root's own indexes, kept for the lifetime of a tree.
#[derive(Debug, Clone)]
pub enum BaseTable {
    /// One order buffer per feature; node tables are windows into it.
    Dense(Vec<Vec<usize>>),
    Sparse(Vec<SparseIndex>),
    /// Nothing is cached; indexes are filtered from the data-level table on demand.
    Tight,
}

/// Per-node handle on the sorted indexes.
#[derive(Debug, Clone)]
pub enum NodeTable {
    /// The same window of every dense order buffer in the base.
    Window(Window),
    /// The base's sparse indexes, used by the root.
    Base,
    Sparse(Vec<SparseIndex>),
    /// Active-set mask and its population.
    Tight(Vec<bool>, usize),
}

impl BaseTable {
    /// Table of the root node owning all `root_count` base ids.
    pub fn root_table(&self, root_ids: &[usize], n_rows: usize) -> NodeTable {
        match self {
            BaseTable::Dense(_) => NodeTable::Window(Window::new(0, root_ids.len())),
            BaseTable::Sparse(_) => NodeTable::Base,
            BaseTable::Tight => {
                let mut mask = vec![false; n_rows];
                for id in root_ids {
                    mask[*id] = true;
                }
                NodeTable::Tight(mask, root_ids.len())
            }
        }
    }

    /// Split the table of a node into the table of its `is_yes` ids and the rest.
    ///
    /// Dense windows are partitioned in place and come back as two adjacent windows,
    /// the yes window first. Sparse indexes are rebuilt for both sides.
    pub fn separate(
        &mut self,
        parent: &NodeTable,
        is_yes: &[bool],
        yes_count: usize,
    ) -> Result<(NodeTable, NodeTable), SortForestError> {
        match (self, parent) {
            (BaseTable::Dense(orders), NodeTable::Window(w)) => {
                if yes_count > w.len() {
                    return Err(SortForestError::inconsistent(
                        "separate",
                        format!("{} ids selected from a window of {}", yes_count, w.len()),
                    ));
                }
                let mut scratch = Vec::with_capacity(w.len() - yes_count);
                for order in orders.iter_mut() {
                    if w.stop > order.len() {
                        return Err(SortForestError::inconsistent(
                            "separate",
                            format!("window {:?} exceeds an order buffer of {}", w, order.len()),
                        ));
                    }
                    dense::partition(&mut order[w.range()], is_yes, yes_count, &mut scratch)?;
                }
                let (yes, no) = w.split(yes_count);
                Ok((NodeTable::Window(yes), NodeTable::Window(no)))
            }
            (BaseTable::Sparse(indexes), NodeTable::Base) => separate_sparse(indexes, is_yes, yes_count),
            (BaseTable::Sparse(_), NodeTable::Sparse(indexes)) => separate_sparse(indexes, is_yes, yes_count),
            (BaseTable::Tight, NodeTable::Tight(mask, count)) => {
                if yes_count > *count {
                    return Err(SortForestError::inconsistent(
                        "separate",
                        format!("{} ids selected from a node of {}", yes_count, count),
                    ));
                }
                let mut yes = vec![false; mask.len()];
                let mut no = vec![false; mask.len()];
                let mut found = 0;
                for (i, active) in mask.iter().enumerate() {
                    if *active {
                        if is_yes[i] {
                            yes[i] = true;
                            found += 1;
                        } else {
                            no[i] = true;
                        }
                    }
                }
                if found != yes_count {
                    return Err(SortForestError::inconsistent(
                        "separate",
                        format!("expected {} selected ids, found {}", yes_count, found),
                    ));
                }
                Ok((NodeTable::Tight(yes, yes_count), NodeTable::Tight(no, count - yes_count)))
            }
            _ => Err(SortForestError::inconsistent(
                "separate",
                "node table does not match the base table layout",
            )),
        }
    }

    /// Index of feature `fx` for the node holding `node`.
    pub fn sorted<'s>(
        &'s self,
        data_level: &'s FeatureTable<'_>,
        node: &'s NodeTable,
        fx: usize,
    ) -> Result<SortedIndex<'s>, SortForestError> {
        match (self, node) {
            (BaseTable::Dense(orders), NodeTable::Window(w)) => {
                let values = data_level.dense_values(fx)?;
                Ok(SortedIndex::Dense(DenseIndex::new(
                    Cow::Borrowed(&orders[fx][w.range()]),
                    values,
                )))
            }
            (BaseTable::Sparse(indexes), NodeTable::Base) => Ok(SortedIndex::Sparse(Cow::Borrowed(&indexes[fx]))),
            (BaseTable::Sparse(_), NodeTable::Sparse(indexes)) => Ok(SortedIndex::Sparse(Cow::Borrowed(&indexes[fx]))),
            (BaseTable::Tight, NodeTable::Tight(mask, count)) => match data_level.sorted(fx) {
                SortedIndex::Dense(full) => {
                    let ids = full.filter(mask, *count)?;
                    let values = data_level.dense_values(fx)?;
                    Ok(SortedIndex::Dense(DenseIndex::new(Cow::Owned(ids), values)))
                }
                SortedIndex::Sparse(full) => Ok(SortedIndex::Sparse(Cow::Owned(full.filter(mask, *count)?))),
            },
            _ => Err(SortForestError::inconsistent(
                "sorted",
                "node table does not match the base table layout",
            )),
        }
    }
}

fn separate_sparse(
    indexes: &[SparseIndex],
    is_yes: &[bool],
    yes_count: usize,
) -> Result<(NodeTable, NodeTable), SortForestError> {
    let mut yes = Vec::with_capacity(indexes.len());
    let mut no = Vec::with_capacity(indexes.len());
    for index in indexes {
        let (y, n) = index.partition(is_yes, yes_count)?;
        yes.push(y);
        no.push(n);
    }
    Ok((NodeTable::Sparse(yes), NodeTable::Sparse(no)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Matrix, SparseMatrix};
    use crate::utils::id_mask;

    fn data() -> Vec<f64> {
        // Two features over six rows, column-major.
        vec![0.0, 0.0, 3.0, 3.0, 5.0, 5.0, 1.0, 0.0, -2.0, 0.0, 4.0, 0.0]
    }

    fn thresholds(base: &BaseTable, table: &FeatureTable, node: &NodeTable, fx: usize) -> Vec<f64> {
        base.sorted(table, node, fx).unwrap().threshold_values()
    }

    #[test]
    fn test_bootstrap_representations_agree() {
        let v = data();
        let m = Matrix::new(&v, 6, 2);
        let s = SparseMatrix::from_dense(&m).unwrap();
        let all: Vec<usize> = (0..6).collect();
        let dense = FeatureTable::bootstrap(&m, &all, Representation::Dense).unwrap();
        let sparse = FeatureTable::bootstrap(&s, &all, Representation::Sparse).unwrap();
        let dense_from_sparse = FeatureTable::bootstrap(&s, &all, Representation::Dense).unwrap();
        assert_eq!(dense.representation(), Representation::Dense);
        assert_eq!(sparse.representation(), Representation::Sparse);
        assert_eq!(sparse.n_features(), 2);
        for fx in 0..2 {
            let t = dense.sorted(fx).threshold_values();
            assert_eq!(t, sparse.sorted(fx).threshold_values());
            assert_eq!(t, dense_from_sparse.sorted(fx).threshold_values());
        }
        assert_eq!(dense.sorted(1).threshold_values(), vec![-1.0, 0.5, 2.5]);
    }

    #[test]
    fn test_separate_dense_windows() {
        let v = data();
        let m = Matrix::new(&v, 6, 2);
        let all: Vec<usize> = (0..6).collect();
        let table = FeatureTable::bootstrap(&m, &all, Representation::Dense).unwrap();
        let mut base = table.derive_base().unwrap();
        let root = base.root_table(&all, 6);

        let (is_yes, yes_count) = id_mask(&[0, 1], 6);
        let (yes, no) = base.separate(&root, &is_yes, yes_count).unwrap();
        match (&yes, &no) {
            (NodeTable::Window(y), NodeTable::Window(n)) => {
                assert_eq!(*y, Window::new(0, 2));
                assert_eq!(*n, Window::new(2, 6));
            }
            _ => panic!("expected dense windows"),
        }
        assert_eq!(thresholds(&base, &table, &yes, 1), vec![0.5]);
        assert_eq!(thresholds(&base, &table, &no, 0), vec![4.0]);
        assert_eq!(thresholds(&base, &table, &no, 1), vec![-1.0, 2.0]);
        // The data-level table is untouched.
        assert_eq!(table.sorted(0).threshold_values(), vec![1.5, 4.0]);

        let (bad, bad_count) = id_mask(&[0, 2], 6);
        assert!(base.separate(&yes, &bad, bad_count).is_err());
    }

    #[test]
    fn test_separate_sparse_and_tight_match_dense() {
        let v = data();
        let m = Matrix::new(&v, 6, 2);
        let all: Vec<usize> = (0..6).collect();
        let dense = FeatureTable::bootstrap(&m, &all, Representation::Dense).unwrap();
        let sparse = FeatureTable::bootstrap(&m, &all, Representation::Sparse).unwrap();
        let (is_yes, yes_count) = id_mask(&[1, 3, 4], 6);

        let mut dense_base = dense.derive_base().unwrap();
        let dense_root = dense_base.root_table(&all, 6);
        let dense_sides = dense_base.separate(&dense_root, &is_yes, yes_count).unwrap();

        let mut sparse_base = sparse.derive_base().unwrap();
        let sparse_root = sparse_base.root_table(&all, 6);
        let sparse_sides = sparse_base.separate(&sparse_root, &is_yes, yes_count).unwrap();

        let mut tight_base = BaseTable::Tight;
        let tight_root = tight_base.root_table(&all, 6);
        let tight_sides = tight_base.separate(&tight_root, &is_yes, yes_count).unwrap();

        for fx in 0..2 {
            let d = thresholds(&dense_base, &dense, &dense_sides.0, fx);
            assert_eq!(d, thresholds(&sparse_base, &sparse, &sparse_sides.0, fx));
            assert_eq!(d, thresholds(&tight_base, &dense, &tight_sides.0, fx));
            let d = thresholds(&dense_base, &dense, &dense_sides.1, fx);
            assert_eq!(d, thresholds(&sparse_base, &sparse, &sparse_sides.1, fx));
            assert_eq!(d, thresholds(&tight_base, &dense, &tight_sides.1, fx));
        }
    }

    #[test]
    fn test_filter_sampled() {
        let v = data();
        let m = Matrix::new(&v, 6, 2);
        let all: Vec<usize> = (0..6).collect();
        let table = FeatureTable::bootstrap(&m, &all, Representation::Dense).unwrap();
        let (sample, count) = id_mask(&[0, 2, 4], 6);
        let base = table.filter_sampled(&sample, count).unwrap();
        let root = base.root_table(&[0, 2, 4], 6);
        assert_eq!(thresholds(&base, &table, &root, 0), vec![1.5, 4.0]);
        assert_eq!(thresholds(&base, &table, &root, 1), vec![-0.5, 2.5]);
    }

    #[test]
    fn test_mismatched_layout_is_inconsistent() {
        let v = data();
        let m = Matrix::new(&v, 6, 2);
        let all: Vec<usize> = (0..6).collect();
        let table = FeatureTable::bootstrap(&m, &all, Representation::Dense).unwrap();
        let base = table.derive_base().unwrap();
        let err = base.sorted(&table, &NodeTable::Base, 0).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Consistency);
    }
}

//! Data
//!
//! Column-addressable numeric storage. [`Matrix`] borrows a dense column-major buffer,
//! [`SparseMatrix`] owns compressed sparse columns. Both are read through [`DataMatrix`],
//! which is all the sorted indexes and the tree ever need.
use crate::errors::SortForestError;

/// Read-only view of one feature column.
#[derive(Debug, Clone, Copy)]
pub enum Column<'a> {
    /// One value per row.
    Dense(&'a [f64]),
    /// Explicit non-zero values, `rows` ascending. Rows not listed are zero.
    Sparse { rows: &'a [usize], values: &'a [f64] },
}

impl<'a> Column<'a> {
    /// Number of explicitly non-zero values in the column.
    pub fn non_zero_count(&self) -> usize {
        match self {
            Column::Dense(values) => values.iter().filter(|v| **v != 0.0).count(),
            Column::Sparse { values, .. } => values.iter().filter(|v| **v != 0.0).count(),
        }
    }

    /// First row holding a NaN, if any.
    pub fn find_nan(&self) -> Option<usize> {
        match self {
            Column::Dense(values) => values.iter().position(|v| v.is_nan()),
            Column::Sparse { rows, values } => values.iter().position(|v| v.is_nan()).map(|i| rows[i]),
        }
    }

    /// Expand the column into one value per row.
    pub fn to_dense(&self, n_rows: usize) -> Vec<f64> {
        match self {
            Column::Dense(values) => values.to_vec(),
            Column::Sparse { rows, values } => {
                let mut dense = vec![0.0; n_rows];
                for (r, v) in rows.iter().zip(values.iter()) {
                    dense[*r] = *v;
                }
                dense
            }
        }
    }
}

/// Capability every training matrix offers.
///
/// Implementors must be immutable for as long as they are borrowed; the tree
/// relies on column slices staying valid and unchanged.
pub trait DataMatrix: Sync {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
    /// Value at row `row` and column `col`, zero for sparse entries not stored.
    fn value(&self, row: usize, col: usize) -> f64;
    fn column(&self, col: usize) -> Column<'_>;
    /// Fraction of entries that are not zero.
    fn non_zero_ratio(&self) -> f64;
}

/// Contiguous Column Major Matrix data container.
///
/// The matrix borrows its buffer, so the caller keeps ownership and the data
/// cannot change while a tree refers to it.
pub struct Matrix<'a> {
    /// The raw data stored in a single slice.
    pub data: &'a [f64],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a> Matrix<'a> {
    /// Create a new Matrix, `data` holds `cols` consecutive columns of `rows` values.
    pub fn new(data: &'a [f64], rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Matrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &f64 {
        &self.data[self.item_index(i, j)]
    }

    fn item_index(&self, i: usize, j: usize) -> usize {
        j * self.rows + i
    }

    /// Get an entire column in the matrix.
    pub fn get_col(&self, col: usize) -> &'a [f64] {
        let start = self.item_index(0, col);
        &self.data[start..start + self.rows]
    }

    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<f64> {
        (0..self.cols).map(|j| *self.get(row, j)).collect()
    }
}

impl<'a> DataMatrix for Matrix<'a> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn value(&self, row: usize, col: usize) -> f64 {
        *self.get(row, col)
    }

    fn column(&self, col: usize) -> Column<'_> {
        Column::Dense(self.get_col(col))
    }

    fn non_zero_ratio(&self) -> f64 {
        if self.data.is_empty() {
            return 1.0;
        }
        let nz = self.data.iter().filter(|v| **v != 0.0).count();
        nz as f64 / self.data.len() as f64
    }
}

/// Compressed sparse column matrix.
///
/// Column `j` occupies `row_ids[col_ends[j - 1]..col_ends[j]]` (with an implicit
/// leading zero), rows strictly ascending, zeros never stored.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    pub rows: usize,
    pub cols: usize,
    col_ends: Vec<usize>,
    row_ids: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// Build from `(row, column, value)` entries in any order.
    ///
    /// Zero values are dropped. A `(row, column)` pair given twice, an index outside
    /// the shape, or a NaN value is an error.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> Result<Self, SortForestError> {
        let mut entries = Vec::with_capacity(triplets.len());
        for &(r, c, v) in triplets {
            if r >= rows {
                return Err(SortForestError::RowOutOfRange(r, rows));
            }
            if c >= cols {
                return Err(SortForestError::FeatureOutOfRange(c, cols));
            }
            if v.is_nan() {
                return Err(SortForestError::NanValueFound(r, c));
            }
            entries.push((c, r, v));
        }
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        if let Some(w) = entries.windows(2).find(|w| w[0].0 == w[1].0 && w[0].1 == w[1].1) {
            return Err(SortForestError::InvalidParameter(
                "triplets".to_string(),
                "unique (row, column) pairs".to_string(),
                format!("({}, {}) more than once", w[0].1, w[0].0),
            ));
        }

        let mut col_ends = vec![0; cols];
        let mut row_ids = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for (c, r, v) in entries {
            if v != 0.0 {
                col_ends[c] += 1;
                row_ids.push(r);
                values.push(v);
            }
        }
        let mut total = 0;
        for end in col_ends.iter_mut() {
            total += *end;
            *end = total;
        }
        Ok(SparseMatrix {
            rows,
            cols,
            col_ends,
            row_ids,
            values,
        })
    }

    /// Copy the non-zero entries of a dense matrix.
    pub fn from_dense(matrix: &Matrix) -> Result<Self, SortForestError> {
        let mut triplets = Vec::new();
        for j in 0..matrix.cols {
            for (i, v) in matrix.get_col(j).iter().enumerate() {
                if *v != 0.0 {
                    triplets.push((i, j, *v));
                }
            }
        }
        SparseMatrix::from_triplets(matrix.rows, matrix.cols, &triplets)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    fn col_range(&self, col: usize) -> std::ops::Range<usize> {
        let start = if col == 0 { 0 } else { self.col_ends[col - 1] };
        start..self.col_ends[col]
    }
}

impl DataMatrix for SparseMatrix {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn value(&self, row: usize, col: usize) -> f64 {
        let range = self.col_range(col);
        match self.row_ids[range.clone()].binary_search(&row) {
            Ok(i) => self.values[range.start + i],
            Err(_) => 0.0,
        }
    }

    fn column(&self, col: usize) -> Column<'_> {
        let range = self.col_range(col);
        Column::Sparse {
            rows: &self.row_ids[range.clone()],
            values: &self.values[range],
        }
    }

    fn non_zero_ratio(&self) -> f64 {
        let total = self.rows * self.cols;
        if total == 0 {
            return 1.0;
        }
        self.nnz() as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix() {
        let v = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let m = Matrix::new(&v, 3, 2);
        assert_eq!(m.get(0, 0), &1.0);
        assert_eq!(m.get(2, 1), &6.0);
        assert_eq!(m.get_col(1), &[4.0, 5.0, 6.0]);
        assert_eq!(m.get_row(1), vec![2.0, 5.0]);
        assert_eq!(m.value(1, 1), 5.0);
    }

    #[test]
    fn test_non_zero_ratio() {
        let v = vec![0.0, 2.0, 0.0, 0.0, 5.0, 0.0, 0.0, 1.0];
        let m = Matrix::new(&v, 4, 2);
        assert_eq!(m.non_zero_ratio(), 0.375);
        let s = SparseMatrix::from_dense(&m).unwrap();
        assert_eq!(s.nnz(), 3);
        assert_eq!(s.non_zero_ratio(), 0.375);
    }

    #[test]
    fn test_sparse_from_triplets() {
        let s = SparseMatrix::from_triplets(4, 3, &[(3, 1, 2.0), (0, 1, -1.0), (2, 0, 0.0), (1, 2, 7.5)]).unwrap();
        assert_eq!(s.nnz(), 3);
        assert_eq!(s.value(3, 1), 2.0);
        assert_eq!(s.value(0, 1), -1.0);
        assert_eq!(s.value(2, 0), 0.0);
        assert_eq!(s.value(1, 1), 0.0);
        match s.column(1) {
            Column::Sparse { rows, values } => {
                assert_eq!(rows, &[0, 3]);
                assert_eq!(values, &[-1.0, 2.0]);
            }
            Column::Dense(_) => panic!("expected sparse column"),
        }
        assert_eq!(s.column(0).non_zero_count(), 0);
        assert_eq!(s.column(1).to_dense(4), vec![-1.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_sparse_rejects_bad_entries() {
        assert!(matches!(
            SparseMatrix::from_triplets(2, 2, &[(2, 0, 1.0)]),
            Err(SortForestError::RowOutOfRange(2, 2))
        ));
        assert!(matches!(
            SparseMatrix::from_triplets(2, 2, &[(0, 5, 1.0)]),
            Err(SortForestError::FeatureOutOfRange(5, 2))
        ));
        assert!(matches!(
            SparseMatrix::from_triplets(2, 2, &[(1, 1, f64::NAN)]),
            Err(SortForestError::NanValueFound(1, 1))
        ));
        assert!(matches!(
            SparseMatrix::from_triplets(2, 2, &[(1, 1, 1.0), (1, 1, 2.0)]),
            Err(SortForestError::InvalidParameter(..))
        ));
    }

    #[test]
    fn test_find_nan() {
        let v = vec![1.0, f64::NAN, 3.0];
        let m = Matrix::new(&v, 3, 1);
        assert_eq!(m.column(0).find_nan(), Some(1));
    }
}

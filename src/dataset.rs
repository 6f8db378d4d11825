//! Training Data
//!
//! Validates a matrix and builds its data-level feature table, choosing between
//! dense and sparse sorted indexes.
use crate::config::TreeConfig;
use crate::data::DataMatrix;
use crate::errors::SortForestError;
use crate::table::{FeatureTable, Representation};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Caller preference for sorted index storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataManagement {
    /// Decide from the non-zero ratio and the matrix size.
    Auto,
    Dense,
    Sparse,
}

/// Pick the representation used for every feature of `matrix`.
pub fn choose_representation(
    matrix: &dyn DataMatrix,
    mode: DataManagement,
    nonzero_ratio_threshold: f64,
    max_dense_entries: usize,
) -> Representation {
    match mode {
        DataManagement::Dense => Representation::Dense,
        DataManagement::Sparse => Representation::Sparse,
        DataManagement::Auto => {
            let entries = matrix.rows().saturating_mul(matrix.cols());
            if entries > max_dense_entries {
                warn!(
                    "{} x {} matrix exceeds {} entries, using sparse sorted indexes.",
                    matrix.rows(),
                    matrix.cols(),
                    max_dense_entries
                );
                Representation::Sparse
            } else if matrix.non_zero_ratio() < nonzero_ratio_threshold {
                Representation::Sparse
            } else {
                Representation::Dense
            }
        }
    }
}

/// A matrix together with its data-level sorted indexes.
pub struct TrainingData<'a> {
    matrix: &'a dyn DataMatrix,
    table: FeatureTable<'a>,
}

impl<'a> TrainingData<'a> {
    pub fn new(matrix: &'a dyn DataMatrix, config: &TreeConfig) -> Result<Self, SortForestError> {
        config.validate()?;
        for j in 0..matrix.cols() {
            if let Some(i) = matrix.column(j).find_nan() {
                return Err(SortForestError::NanValueFound(i, j));
            }
        }
        let representation = choose_representation(
            matrix,
            config.data_management,
            config.nonzero_ratio_threshold,
            config.max_dense_entries,
        );
        let all: Vec<usize> = (0..matrix.rows()).collect();
        let table = FeatureTable::bootstrap(matrix, &all, representation)?;
        info!(
            "Indexed {} rows and {} features with {:?} sorted indexes (non-zero ratio {:.3}).",
            matrix.rows(),
            matrix.cols(),
            representation,
            matrix.non_zero_ratio()
        );
        Ok(TrainingData { matrix, table })
    }

    pub fn matrix(&self) -> &'a dyn DataMatrix {
        self.matrix
    }

    pub fn table(&self) -> &FeatureTable<'a> {
        &self.table
    }

    pub fn representation(&self) -> Representation {
        self.table.representation()
    }

    pub fn rows(&self) -> usize {
        self.matrix.rows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.cols()
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.matrix.value(row, col)
    }
}

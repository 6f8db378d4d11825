use super::tree::Tree;
use crate::data::DataMatrix;
use crate::errors::SortForestError;
use rayon::prelude::*;

impl<'a> Tree<'a> {
    /// Nodes visited by data point `row` of `data`, root first.
    pub fn node_path(&self, data: &dyn DataMatrix, row: usize) -> Result<Vec<usize>, SortForestError> {
        if row >= data.rows() {
            return Err(SortForestError::RowOutOfRange(row, data.rows()));
        }
        let mut path = vec![0];
        let mut node_idx = 0;
        while let Some(feature) = self.nodes[node_idx].split_feature {
            if feature >= data.cols() {
                return Err(SortForestError::FeatureOutOfRange(feature, data.cols()));
            }
            node_idx = self.nodes[node_idx]
                .get_child_idx(data.value(row, feature))
                .ok_or(SortForestError::StaleFeatureTable(node_idx))?;
            path.push(node_idx);
        }
        Ok(path)
    }

    /// Score of data point `row`: the sum of the weights along its path.
    ///
    /// Internal nodes contribute zero unless the tree retains internal weights.
    pub fn apply(&self, data: &dyn DataMatrix, row: usize) -> Result<f64, SortForestError> {
        Ok(self
            .node_path(data, row)?
            .into_iter()
            .map(|i| self.nodes[i].weight_value)
            .sum())
    }

    /// Leaf reached by data point `row`.
    pub fn leaf_of(&self, data: &dyn DataMatrix, row: usize) -> Result<usize, SortForestError> {
        let path = self.node_path(data, row)?;
        Ok(path[path.len() - 1])
    }

    /// Score every row of `data`.
    pub fn predict(&self, data: &dyn DataMatrix, parallel: bool) -> Result<Vec<f64>, SortForestError> {
        if parallel {
            self.predict_parallel(data)
        } else {
            self.predict_single_threaded(data)
        }
    }

    fn predict_single_threaded(&self, data: &dyn DataMatrix) -> Result<Vec<f64>, SortForestError> {
        (0..data.rows()).map(|row| self.apply(data, row)).collect()
    }

    fn predict_parallel(&self, data: &dyn DataMatrix) -> Result<Vec<f64>, SortForestError> {
        (0..data.rows())
            .into_par_iter()
            .map(|row| self.apply(data, row))
            .collect()
    }
}

//! Scorer
//!
//! Split selection is pluggable: the tree asks a [`Scorer`] for the best
//! feature and threshold of a leaf and applies whatever it returns.
//! [`SquaredErrorScorer`] is a least-squares reference that walks the
//! node's sorted indexes run by run.
use crate::config::TreeConfig;
use crate::constants::MIN_SPLIT_GAIN;
use crate::errors::SortForestError;
use crate::sorted::Direction;
use crate::tree::tree::Tree;
use crate::utils::validate_positive_float_parameter;
use serde::{Deserialize, Serialize};

/// A split chosen for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitDecision {
    pub feature: usize,
    pub threshold: f64,
    pub gain: f64,
    pub left_weight: f64,
    pub right_weight: f64,
}

pub trait Scorer {
    /// Best split of leaf `node`, or `None` when no split is worth making.
    fn best_split(&self, tree: &mut Tree<'_>, node: usize) -> Result<Option<SplitDecision>, SortForestError>;
}

/// Least-squares split search over residual targets.
pub struct SquaredErrorScorer<'t> {
    targets: &'t [f64],
    sample_weights: Option<&'t [f64]>,
    lambda: f64,
    min_leaf_size: usize,
}

impl<'t> SquaredErrorScorer<'t> {
    pub fn new(
        targets: &'t [f64],
        sample_weights: Option<&'t [f64]>,
        lambda: f64,
        min_leaf_size: usize,
    ) -> Result<Self, SortForestError> {
        validate_positive_float_parameter(lambda, "lambda")?;
        if min_leaf_size == 0 {
            return Err(SortForestError::InvalidParameter(
                "min_leaf_size".to_string(),
                "at least 1".to_string(),
                "0".to_string(),
            ));
        }
        if let Some(i) = targets.iter().position(|y| !y.is_finite()) {
            return Err(SortForestError::InvalidParameter(
                "targets".to_string(),
                "finite values".to_string(),
                format!("{} at {}", targets[i], i),
            ));
        }
        if let Some(w) = sample_weights {
            if w.len() != targets.len() {
                return Err(SortForestError::InvalidParameter(
                    "sample_weights".to_string(),
                    format!("{} weights", targets.len()),
                    w.len().to_string(),
                ));
            }
            if let Some(i) = w.iter().position(|v| !(*v > 0.0 && v.is_finite())) {
                return Err(SortForestError::NonPositiveSampleWeight(i, w[i]));
            }
        }
        Ok(SquaredErrorScorer {
            targets,
            sample_weights,
            lambda,
            min_leaf_size,
        })
    }

    pub fn from_config(
        targets: &'t [f64],
        sample_weights: Option<&'t [f64]>,
        config: &TreeConfig,
    ) -> Result<Self, SortForestError> {
        SquaredErrorScorer::new(targets, sample_weights, config.lambda, config.min_leaf_size)
    }

    #[inline]
    fn weight(&self, id: usize) -> f64 {
        self.sample_weights.map_or(1.0, |w| w[id])
    }

    fn sums(&self, ids: &[usize]) -> (f64, f64) {
        ids.iter().fold((0.0, 0.0), |(w, wy), id| {
            let wi = self.weight(*id);
            (w + wi, wy + wi * self.targets[*id])
        })
    }

    #[inline]
    fn score(&self, w: f64, wy: f64) -> f64 {
        wy * wy / (w + self.lambda)
    }

    /// Regularized mean target of `ids`.
    pub fn node_weight(&self, ids: &[usize]) -> f64 {
        let (w, wy) = self.sums(ids);
        if w + self.lambda > 0.0 {
            wy / (w + self.lambda)
        } else {
            0.0
        }
    }
}

impl<'t> Scorer for SquaredErrorScorer<'t> {
    fn best_split(&self, tree: &mut Tree<'_>, node: usize) -> Result<Option<SplitDecision>, SortForestError> {
        tree.prepare(node)?;
        let tree: &Tree = tree;
        let ids = tree.node_ids(node)?;
        let n = ids.len();
        if n < 2 * self.min_leaf_size {
            return Ok(None);
        }
        if let Some(id) = ids.iter().find(|id| **id >= self.targets.len()) {
            return Err(SortForestError::RowOutOfRange(*id, self.targets.len()));
        }
        let (w_all, wy_all) = self.sums(ids);
        let parent_score = self.score(w_all, wy_all);
        // Retained internal weights add up along the path, so children carry only the difference.
        let offset = if tree.retains_internal_weight() {
            tree.path_weight(node)?
        } else {
            0.0
        };

        let mut best: Option<SplitDecision> = None;
        for fx in 0..tree.n_features() {
            let index = tree.sorted(node, fx)?;
            let backward = index.direction() == Direction::Backward;
            let (mut dw, mut dwy, mut dn) = (0.0, 0.0, 0);
            for run in index.runs() {
                for id in run.ids {
                    let wi = self.weight(*id);
                    dw += wi;
                    dwy += wi * self.targets[*id];
                }
                dn += run.ids.len();
                let (le_w, le_wy, le_n) = if backward {
                    (w_all - dw, wy_all - dwy, n - dn)
                } else {
                    (dw, dwy, dn)
                };
                let gt_n = n - le_n;
                if le_n < self.min_leaf_size || gt_n < self.min_leaf_size {
                    continue;
                }
                let (gt_w, gt_wy) = (w_all - le_w, wy_all - le_wy);
                let gain = self.score(le_w, le_wy) + self.score(gt_w, gt_wy) - parent_score;
                let better = best.as_ref().map_or(true, |b| gain > b.gain);
                if gain > MIN_SPLIT_GAIN && better {
                    best = Some(SplitDecision {
                        feature: fx,
                        threshold: run.threshold,
                        gain,
                        left_weight: le_wy / (le_w + self.lambda) - offset,
                        right_weight: gt_wy / (gt_w + self.lambda) - offset,
                    });
                }
            }
        }
        Ok(best)
    }
}

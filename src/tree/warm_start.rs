//! Warm start
//!
//! Rebuilds the arena and node pool of a tree that was trained elsewhere, so
//! growth can continue from it. [`WarmStartMode::Exact`] replays every split
//! through [`Tree::split_node`] and checks the result node by node.
//! [`WarmStartMode::Fast`] routes each id to its leaf once and fills in the
//! windows of internal nodes from their children, without touching any sorted
//! index. Both produce the same tree.
use super::tree::Tree;
use crate::config::TreeConfig;
use crate::constants::REPLAYED_SPLIT_GAIN;
use crate::dataset::TrainingData;
use crate::errors::SortForestError;
use crate::model::TreeModel;
use crate::node::{Node, Window};
use crate::scorer::SplitDecision;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarmStartMode {
    Exact,
    Fast,
}

impl<'a> Tree<'a> {
    pub fn warm_start(
        data: &'a TrainingData<'a>,
        model: &TreeModel,
        active: Option<&[usize]>,
        config: &TreeConfig,
        mode: WarmStartMode,
    ) -> Result<Self, SortForestError> {
        model.validate(data.cols())?;
        if !config.retain_internal_weight {
            if let Some((i, n)) = model
                .nodes
                .iter()
                .enumerate()
                .find(|(_, n)| !n.is_leaf() && n.weight != 0.0)
            {
                return Err(SortForestError::inconsistent(
                    "warm_start",
                    format!(
                        "internal node {} has weight {} but internal weights are not retained",
                        i, n.weight
                    ),
                ));
            }
        }
        let mut tree = Tree::grow_root(data, active, config)?;
        match mode {
            WarmStartMode::Exact => tree.replay(model)?,
            WarmStartMode::Fast => tree.bucket(model)?,
        }
        info!(
            "Warm started {} nodes over {} data points ({:?}).",
            tree.nodes.len(),
            tree.arena.len(),
            mode
        );
        Ok(tree)
    }

    fn replay(&mut self, model: &TreeModel) -> Result<(), SortForestError> {
        self.nodes[0].weight_value = model.nodes[0].weight;
        let mut internal: Vec<(usize, usize, usize)> = model
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.children().map(|(l, r)| (l, r, i)))
            .collect();
        // Children were numbered as their parents split.
        internal.sort_unstable();
        for (l, r, p) in internal {
            let m = &model.nodes[p];
            let feature = m
                .feature
                .ok_or_else(|| SortForestError::inconsistent("warm_start", format!("node {} has no feature", p)))?;
            let decision = SplitDecision {
                feature,
                threshold: m.threshold,
                gain: REPLAYED_SPLIT_GAIN,
                left_weight: model.nodes[l].weight,
                right_weight: model.nodes[r].weight,
            };
            let record = self.split_node(p, &decision)?;
            if record.left_child != l || record.right_child != r {
                return Err(SortForestError::inconsistent(
                    "warm_start",
                    format!(
                        "replaying node {} created ({}, {}) instead of ({}, {})",
                        p, record.left_child, record.right_child, l, r
                    ),
                ));
            }
        }
        self.verify_against(model)
    }

    fn verify_against(&self, model: &TreeModel) -> Result<(), SortForestError> {
        if self.nodes.len() != model.nodes.len() {
            return Err(SortForestError::inconsistent(
                "warm_start",
                format!("replay built {} nodes, the model has {}", self.nodes.len(), model.nodes.len()),
            ));
        }
        for (n, m) in self.nodes.iter().zip(model.nodes.iter()) {
            let same_split = n.split_feature == m.feature && (n.is_leaf() || n.split_value == m.threshold);
            if !same_split
                || n.left_child != m.left_child
                || n.right_child != m.right_child
                || n.parent_node != m.parent
                || n.weight_value != m.weight
            {
                return Err(SortForestError::inconsistent(
                    "warm_start",
                    format!("replayed node {} does not match the model", n.num),
                ));
            }
        }
        Ok(())
    }

    fn bucket(&mut self, model: &TreeModel) -> Result<(), SortForestError> {
        let n = model.nodes.len();
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); n];
        for id in &self.root_ids {
            let leaf = model.leaf_for(|f| self.data.value(*id, f));
            buckets[leaf].push(*id);
        }

        let mut nodes: Vec<Node> = Vec::with_capacity(n);
        for (i, m) in model.nodes.iter().enumerate() {
            let depth = m.parent.map_or(0, |p| nodes[p].depth + 1);
            let mut node = Node::new_leaf(i, depth, m.parent, Window::new(0, 0), m.weight);
            if let (Some(feature), Some((l, r))) = (m.feature, m.children()) {
                node.make_parent_node(feature, m.threshold, REPLAYED_SPLIT_GAIN, l, r);
            }
            nodes.push(node);
        }

        // Leaves take consecutive windows in pre-order.
        let mut arena = Vec::new();
        arena
            .try_reserve_exact(self.root_ids.len())
            .map_err(|e| SortForestError::AllocationFailed(format!("an arena of {} ids: {}", self.root_ids.len(), e)))?;
        let mut pre_order = Vec::with_capacity(n);
        let mut stack = vec![0];
        while let Some(idx) = stack.pop() {
            pre_order.push(idx);
            match nodes[idx].children() {
                Some((l, r)) => {
                    stack.push(r);
                    stack.push(l);
                }
                None => {
                    let start = arena.len();
                    arena.extend_from_slice(&buckets[idx]);
                    nodes[idx].start_idx = start;
                    nodes[idx].stop_idx = arena.len();
                }
            }
        }
        for idx in pre_order.into_iter().rev() {
            if let Some((l, r)) = nodes[idx].children() {
                let (lw, rw) = (nodes[l].window(), nodes[r].window());
                if lw.stop != rw.start {
                    return Err(SortForestError::inconsistent(
                        "warm_start",
                        format!("windows {:?} and {:?} of node {} are not adjacent", lw, rw, idx),
                    ));
                }
                if lw.is_empty() && rw.is_empty() {
                    return Err(SortForestError::EmptyNode(idx));
                }
                nodes[idx].start_idx = lw.start;
                nodes[idx].stop_idx = rw.stop;
            }
        }
        if arena.len() != self.root_ids.len() || nodes[0].window() != Window::new(0, arena.len()) {
            return Err(SortForestError::inconsistent(
                "warm_start",
                format!("root window {:?} does not cover {} ids", nodes[0].window(), self.root_ids.len()),
            ));
        }

        let root_table = self.tables[0].take();
        self.tables = vec![None; n];
        self.tables[0] = root_table;
        self.nodes = nodes;
        self.arena = arena;
        Ok(())
    }
}

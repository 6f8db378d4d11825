use crate::config::TreeConfig;
use crate::dataset::TrainingData;
use crate::errors::SortForestError;
use crate::grower::{Candidate, GrowPolicy, Grower};
use crate::model::{ModelNode, TreeModel};
use crate::node::{Node, SplitRecord, Window};
use crate::scorer::{Scorer, SplitDecision};
use crate::sorted::SortedIndex;
use crate::table::{BaseTable, NodeTable};
use crate::utils::{id_mask, stable_partition};
use log::{debug, info, trace};
use std::collections::{BinaryHeap, VecDeque};
use std::fmt::{self, Display};

/// A tree under construction.
///
/// Nodes live in one vector and refer to each other by id. Every node owns a
/// window of the id arena; a split carves its window into the `<=` window
/// followed by the `>` window. Feature tables are derived lazily: a split only
/// records the children, and the first time either child needs its sorted
/// indexes both children are derived from the parent, whose table is then
/// dropped.
pub struct Tree<'a> {
    pub(crate) data: &'a TrainingData<'a>,
    pub nodes: Vec<Node>,
    pub(crate) arena: Vec<usize>,
    pub(crate) root_ids: Vec<usize>,
    pub(crate) base: BaseTable,
    pub(crate) tables: Vec<Option<NodeTable>>,
    pub(crate) retain_internal_weight: bool,
}

impl<'a> Tree<'a> {
    /// Create the root over `active` rows, or every row of `data` when `None`.
    ///
    /// A strict subset of rows is a bagged root: its base table is filtered
    /// from the data-level table instead of copied.
    pub fn grow_root(
        data: &'a TrainingData<'a>,
        active: Option<&[usize]>,
        config: &TreeConfig,
    ) -> Result<Self, SortForestError> {
        config.validate()?;
        let n_rows = data.rows();
        let root_ids: Vec<usize> = match active {
            None => (0..n_rows).collect(),
            Some(ids) => {
                let mut seen = vec![false; n_rows];
                for id in ids {
                    if *id >= n_rows {
                        return Err(SortForestError::RowOutOfRange(*id, n_rows));
                    }
                    if seen[*id] {
                        return Err(SortForestError::DuplicateId(*id));
                    }
                    seen[*id] = true;
                }
                let mut ids = ids.to_vec();
                ids.sort_unstable();
                ids
            }
        };
        if root_ids.is_empty() {
            return Err(SortForestError::EmptyNode(0));
        }

        let base = if config.memory_tight {
            BaseTable::Tight
        } else if root_ids.len() < n_rows {
            let (sample, count) = id_mask(&root_ids, n_rows);
            data.table().filter_sampled(&sample, count)?
        } else {
            data.table().derive_base()?
        };
        let root_table = base.root_table(&root_ids, n_rows);

        let mut arena = Vec::new();
        arena
            .try_reserve_exact(root_ids.len())
            .map_err(|e| SortForestError::AllocationFailed(format!("an arena of {} ids: {}", root_ids.len(), e)))?;
        arena.extend_from_slice(&root_ids);

        debug!(
            "Grew root over {} of {} rows ({}).",
            root_ids.len(),
            n_rows,
            if config.memory_tight { "memory tight" } else { "cached tables" }
        );
        let root = Node::new_leaf(0, 0, None, Window::new(0, root_ids.len()), 0.0);
        Ok(Tree {
            data,
            nodes: vec![root],
            arena,
            root_ids,
            base,
            tables: vec![Some(root_table)],
            retain_internal_weight: config.retain_internal_weight,
        })
    }

    pub fn data(&self) -> &'a TrainingData<'a> {
        self.data
    }

    pub(crate) fn check_node(&self, node: usize) -> Result<(), SortForestError> {
        if node >= self.nodes.len() {
            return Err(SortForestError::NodeOutOfRange(node, self.nodes.len()));
        }
        Ok(())
    }

    pub fn node(&self, node: usize) -> Result<&Node, SortForestError> {
        self.check_node(node)?;
        Ok(&self.nodes[node])
    }

    /// Ids routed to `node`.
    pub fn node_ids(&self, node: usize) -> Result<&[usize], SortForestError> {
        self.check_node(node)?;
        Ok(&self.arena[self.nodes[node].window().range()])
    }

    /// Every id the root was grown over, ascending.
    pub fn root_ids(&self) -> &[usize] {
        &self.root_ids
    }

    pub fn n_features(&self) -> usize {
        self.data.cols()
    }

    pub fn retains_internal_weight(&self) -> bool {
        self.retain_internal_weight
    }

    /// Sum of the weights from the root down to `node`, inclusive.
    pub fn path_weight(&self, node: usize) -> Result<f64, SortForestError> {
        self.check_node(node)?;
        let mut total = self.nodes[node].weight_value;
        let mut current = node;
        while let Some(parent) = self.nodes[current].parent_node {
            total += self.nodes[parent].weight_value;
            current = parent;
        }
        Ok(total)
    }

    /// Make the sorted indexes of leaf `node` available, deriving them down
    /// from the nearest ancestor that still holds a table.
    pub fn prepare(&mut self, node: usize) -> Result<(), SortForestError> {
        self.check_node(node)?;
        if self.tables[node].is_some() {
            return Ok(());
        }
        if !self.nodes[node].is_leaf() {
            return Err(SortForestError::StaleFeatureTable(node));
        }
        let mut chain = vec![node];
        let mut current = node;
        let top = loop {
            let parent = self.nodes[current]
                .parent_node
                .ok_or(SortForestError::StaleFeatureTable(node))?;
            if self.tables[parent].is_some() {
                break parent;
            }
            chain.push(parent);
            current = parent;
        };
        self.derive_children(top)?;
        for ancestor in chain[1..].iter().rev() {
            self.derive_children(*ancestor)?;
        }
        Ok(())
    }

    fn derive_children(&mut self, parent: usize) -> Result<(), SortForestError> {
        let (left, right) = self.nodes[parent]
            .children()
            .ok_or(SortForestError::StaleFeatureTable(parent))?;
        match (self.tables[left].is_some(), self.tables[right].is_some()) {
            (false, false) => (),
            (true, true) => return Ok(()),
            _ => {
                return Err(SortForestError::inconsistent(
                    "prepare",
                    format!("only one child of node {} has a feature table", parent),
                ))
            }
        }
        let table = self.tables[parent]
            .take()
            .ok_or(SortForestError::StaleFeatureTable(parent))?;
        let left_window = self.nodes[left].window();
        let right_window = self.nodes[right].window();
        let (is_yes, yes_count) = id_mask(&self.arena[left_window.range()], self.data.rows());
        let (yes, no) = self.base.separate(&table, &is_yes, yes_count)?;
        if let (NodeTable::Window(y), NodeTable::Window(n)) = (&yes, &no) {
            if *y != left_window || *n != right_window {
                return Err(SortForestError::inconsistent(
                    "prepare",
                    format!(
                        "derived windows {:?} and {:?} differ from the arena windows of nodes {} and {}",
                        y, n, left, right
                    ),
                ));
            }
        }
        debug!("Derived feature tables of nodes {} and {} from node {}.", left, right, parent);
        self.tables[left] = Some(yes);
        self.tables[right] = Some(no);
        Ok(())
    }

    /// Sorted index of feature `fx` for a prepared node.
    pub fn sorted(&self, node: usize, fx: usize) -> Result<SortedIndex<'_>, SortForestError> {
        self.check_node(node)?;
        if fx >= self.n_features() {
            return Err(SortForestError::FeatureOutOfRange(fx, self.n_features()));
        }
        let table = self.tables[node]
            .as_ref()
            .ok_or(SortForestError::StaleFeatureTable(node))?;
        self.base.sorted(self.data.table(), table, fx)
    }

    /// Split leaf `node` on `decision.feature <= decision.threshold`.
    ///
    /// The `<=` ids move to the front of the node's window and become the left
    /// child. Either side may end up empty, but an empty node cannot be split.
    pub fn split_node(&mut self, node: usize, decision: &SplitDecision) -> Result<SplitRecord, SortForestError> {
        self.check_node(node)?;
        if !self.nodes[node].is_leaf() {
            return Err(SortForestError::inconsistent(
                "split_node",
                format!("node {} has already been split", node),
            ));
        }
        let window = self.nodes[node].window();
        if window.is_empty() {
            return Err(SortForestError::EmptyNode(node));
        }
        if decision.feature >= self.n_features() {
            return Err(SortForestError::FeatureOutOfRange(decision.feature, self.n_features()));
        }
        for (name, value) in [
            ("threshold", decision.threshold),
            ("left_weight", decision.left_weight),
            ("right_weight", decision.right_weight),
        ] {
            if value.is_nan() {
                return Err(SortForestError::InvalidParameter(
                    name.to_string(),
                    "a number".to_string(),
                    "NaN".to_string(),
                ));
            }
        }

        self.prepare(node)?;
        let (le, gt) = {
            let index = self.sorted(node, decision.feature)?;
            index.split_by_threshold(&self.arena[window.range()], decision.threshold)?
        };
        if le.len() + gt.len() != window.len() {
            return Err(SortForestError::inconsistent(
                "split_node",
                format!(
                    "{} + {} ids after splitting a node of {}",
                    le.len(),
                    gt.len(),
                    window.len()
                ),
            ));
        }
        let (is_yes, yes_count) = id_mask(&le, self.data.rows());
        let mut scratch = Vec::with_capacity(gt.len());
        let moved = stable_partition(&mut self.arena[window.range()], &is_yes, &mut scratch);
        if moved != le.len() || yes_count != le.len() {
            return Err(SortForestError::inconsistent(
                "split_node",
                format!("{} ids fall left but {} were moved", le.len(), moved),
            ));
        }
        let (left_window, right_window) = window.split(le.len());
        trace!(
            "Carved windows {:?} and {:?} out of node {}.",
            left_window,
            right_window,
            node
        );

        let depth = self.nodes[node].depth + 1;
        let left = self.nodes.len();
        let right = left + 1;
        self.nodes
            .push(Node::new_leaf(left, depth, Some(node), left_window, decision.left_weight));
        self.nodes
            .push(Node::new_leaf(right, depth, Some(node), right_window, decision.right_weight));
        self.tables.push(None);
        self.tables.push(None);

        let retain = self.retain_internal_weight;
        let parent = &mut self.nodes[node];
        let weight_before = parent.weight_value;
        parent.make_parent_node(decision.feature, decision.threshold, decision.gain, left, right);
        if !retain {
            parent.weight_value = 0.0;
        }

        let record = SplitRecord {
            node,
            depth: depth - 1,
            feature: decision.feature,
            threshold: decision.threshold,
            gain: decision.gain,
            population: window.len(),
            left_population: left_window.len(),
            right_population: right_window.len(),
            weight_before,
            left_weight: decision.left_weight,
            right_weight: decision.right_weight,
            left_child: left,
            right_child: right,
        };
        debug!("Split {}", record);
        Ok(record)
    }

    /// Overwrite the weight of a node.
    pub fn set_weight(&mut self, node: usize, weight: f64) -> Result<(), SortForestError> {
        self.check_node(node)?;
        if weight.is_nan() {
            return Err(SortForestError::InvalidParameter(
                "weight".to_string(),
                "a number".to_string(),
                "NaN".to_string(),
            ));
        }
        if !self.retain_internal_weight && !self.nodes[node].is_leaf() && weight != 0.0 {
            return Err(SortForestError::inconsistent(
                "set_weight",
                format!("internal node {} cannot carry a weight unless internal weights are retained", node),
            ));
        }
        self.nodes[node].weight_value = weight;
        Ok(())
    }

    /// Grow the tree with `scorer` until no leaf is worth splitting or a limit is hit.
    ///
    /// Every current leaf is a candidate, so growth can resume on a warm-started tree.
    /// Returns the number of splits made.
    pub fn grow(&mut self, scorer: &dyn Scorer, config: &TreeConfig) -> Result<usize, SortForestError> {
        config.validate()?;
        match config.grow_policy {
            GrowPolicy::LossGuide => self.grow_with(BinaryHeap::new(), scorer, config),
            GrowPolicy::DepthWise => self.grow_with(VecDeque::new(), scorer, config),
            GrowPolicy::DepthFirst => self.grow_with(Vec::new(), scorer, config),
        }
    }

    fn grow_with<G: Grower>(
        &mut self,
        mut grower: G,
        scorer: &dyn Scorer,
        config: &TreeConfig,
    ) -> Result<usize, SortForestError> {
        let mut n_leaves = self.leaf_count();
        let mut splits = 0;
        let leaves: Vec<usize> = self.nodes.iter().filter(|n| n.is_leaf()).map(|n| n.num).collect();
        for node in leaves {
            self.propose(&mut grower, scorer, node, config)?;
        }
        while let Some(candidate) = grower.get_next_node() {
            if config.max_leaves.map_or(false, |m| n_leaves >= m) {
                break;
            }
            let record = self.split_node(candidate.node, &candidate.decision)?;
            if record.left_population == 0 || record.right_population == 0 {
                return Err(SortForestError::inconsistent(
                    "grow",
                    format!(
                        "proposed split of node {} on feature {} at {} left a child empty ({} / {})",
                        record.node, record.feature, record.threshold, record.left_population, record.right_population
                    ),
                ));
            }
            n_leaves += 1;
            splits += 1;
            for child in [record.left_child, record.right_child] {
                self.propose(&mut grower, scorer, child, config)?;
            }
        }
        info!(
            "Grew {} splits with {:?}, the tree has {} leaves and depth {}.",
            splits,
            config.grow_policy,
            n_leaves,
            self.max_depth()
        );
        Ok(splits)
    }

    fn propose<G: Grower>(
        &mut self,
        grower: &mut G,
        scorer: &dyn Scorer,
        node: usize,
        config: &TreeConfig,
    ) -> Result<(), SortForestError> {
        if config.max_depth.map_or(false, |d| self.nodes[node].depth >= d) {
            return Ok(());
        }
        if self.nodes[node].population() < 2 * config.min_leaf_size {
            return Ok(());
        }
        if let Some(decision) = scorer.best_split(self, node)? {
            grower.add_node(Candidate { node, decision });
        }
        Ok(())
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Smallest leaf population.
    pub fn min_population(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.population())
            .min()
            .unwrap_or(0)
    }

    /// Node ids in pre-order, left subtree first.
    pub fn pre_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0];
        while let Some(idx) = stack.pop() {
            order.push(idx);
            if let Some((left, right)) = self.nodes[idx].children() {
                stack.push(right);
                stack.push(left);
            }
        }
        order
    }

    /// Leaves in pre-order, which is also the order of their arena windows.
    pub fn leaves_in_order(&self) -> Vec<usize> {
        self.pre_order()
            .into_iter()
            .filter(|i| self.nodes[*i].is_leaf())
            .collect()
    }

    /// Conditions a data point meets to reach `node`, outermost first.
    pub fn rule(&self, node: usize) -> Result<String, SortForestError> {
        self.check_node(node)?;
        let mut conditions = Vec::new();
        let mut current = node;
        while let Some(parent) = self.nodes[current].parent_node {
            let p = &self.nodes[parent];
            let feature = p.split_feature.ok_or_else(|| {
                SortForestError::inconsistent("rule", format!("parent {} of node {} is a leaf", parent, current))
            })?;
            let op = if p.left_child == Some(current) { "<=" } else { ">" };
            conditions.push(format!("x[{}] {} {}", feature, op, p.split_value));
            current = parent;
        }
        if conditions.is_empty() {
            return Ok("true".to_string());
        }
        conditions.reverse();
        Ok(conditions.join(" && "))
    }

    /// Export the node table.
    pub fn model(&self) -> TreeModel {
        let nodes = self
            .nodes
            .iter()
            .map(|n| ModelNode {
                feature: n.split_feature,
                threshold: n.split_value,
                left_child: n.left_child,
                right_child: n.right_child,
                parent: n.parent_node,
                weight: n.weight_value,
            })
            .collect();
        TreeModel { root: 0, nodes }
    }

    /// Check every structural invariant of the node pool, the arena and the feature tables.
    pub fn check_invariants(&self) -> Result<(), SortForestError> {
        let fail = |what: String| Err(SortForestError::inconsistent("check_invariants", what));
        if self.arena.len() != self.root_ids.len() || self.nodes[0].window() != Window::new(0, self.arena.len()) {
            return fail(format!("root window {:?} does not cover the arena", self.nodes[0].window()));
        }
        let mut sorted = self.arena.clone();
        sorted.sort_unstable();
        if sorted != self.root_ids {
            return fail("the arena is not a permutation of the root ids".to_string());
        }
        for (i, n) in self.nodes.iter().enumerate() {
            if n.num != i {
                return fail(format!("node {} is stored at {}", n.num, i));
            }
            if let Some((l, r)) = n.children() {
                let (left, right) = (&self.nodes[l], &self.nodes[r]);
                if left.parent_node != Some(i) || right.parent_node != Some(i) {
                    return fail(format!("children of node {} do not point back to it", i));
                }
                if left.depth != n.depth + 1 || right.depth != n.depth + 1 {
                    return fail(format!("children of node {} have the wrong depth", i));
                }
                if left.start_idx != n.start_idx || left.stop_idx != right.start_idx || right.stop_idx != n.stop_idx {
                    return fail(format!("child windows of node {} are not adjacent halves of its window", i));
                }
                let feature = n.split_feature.unwrap_or(0);
                for id in &self.arena[left.window().range()] {
                    if self.data.value(*id, feature) > n.split_value {
                        return fail(format!("id {} is left of node {} but above its threshold", id, i));
                    }
                }
                for id in &self.arena[right.window().range()] {
                    if self.data.value(*id, feature) <= n.split_value {
                        return fail(format!("id {} is right of node {} but not above its threshold", id, i));
                    }
                }
                if self.tables[i].is_some() && (self.tables[l].is_some() || self.tables[r].is_some()) {
                    return fail(format!("node {} kept its table after its children were derived", i));
                }
            }
            if let Some(NodeTable::Window(w)) = &self.tables[i] {
                if *w != n.window() {
                    return fail(format!("table window {:?} of node {} is not its arena window", w, i));
                }
            }
        }
        let mut next = 0;
        for leaf in self.leaves_in_order() {
            let w = self.nodes[leaf].window();
            if w.start != next {
                return fail(format!("leaf {} starts at {} instead of {}", leaf, w.start, next));
            }
            next = w.stop;
        }
        if next != self.arena.len() {
            return fail(format!("leaves cover {} of {} ids", next, self.arena.len()));
        }
        Ok(())
    }
}

impl<'a> Display for Tree<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut r = String::new();
        for idx in self.pre_order() {
            let node = &self.nodes[idx];
            r += format!("{}{}\n", "      ".repeat(node.depth).as_str(), node).as_str();
        }
        write!(f, "{}", r)
    }
}

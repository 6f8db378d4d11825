use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Contiguous `[start, stop)` range of the id arena, or of a per-feature order buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: usize,
    pub stop: usize,
}

impl Window {
    pub fn new(start: usize, stop: usize) -> Self {
        Window { start, stop }
    }

    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop == self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.stop
    }

    /// Two adjacent windows, the first holding `at` ids.
    pub fn split(self, at: usize) -> (Window, Window) {
        let mid = self.start + at;
        (Window::new(self.start, mid), Window::new(mid, self.stop))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Node {
    pub num: usize,
    pub weight_value: f64,
    pub depth: usize,
    pub split_value: f64,
    pub split_feature: Option<usize>,
    pub split_gain: f64,
    pub left_child: Option<usize>,
    pub right_child: Option<usize>,
    pub parent_node: Option<usize>,
    pub start_idx: usize,
    pub stop_idx: usize,
}

impl Node {
    /// Create a leaf owning `window` of the arena.
    pub fn new_leaf(num: usize, depth: usize, parent_node: Option<usize>, window: Window, weight_value: f64) -> Self {
        Node {
            num,
            weight_value,
            depth,
            split_value: 0.0,
            split_feature: None,
            split_gain: 0.0,
            left_child: None,
            right_child: None,
            parent_node,
            start_idx: window.start,
            stop_idx: window.stop,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.split_feature.is_none()
    }

    pub fn window(&self) -> Window {
        Window::new(self.start_idx, self.stop_idx)
    }

    /// Number of data points routed to this node.
    pub fn population(&self) -> usize {
        self.stop_idx - self.start_idx
    }

    pub fn children(&self) -> Option<(usize, usize)> {
        match (self.left_child, self.right_child) {
            (Some(l), Some(r)) => Some((l, r)),
            _ => None,
        }
    }

    /// Turn this leaf into an internal node.
    pub fn make_parent_node(&mut self, feature: usize, threshold: f64, gain: f64, left_child: usize, right_child: usize) {
        self.split_feature = Some(feature);
        self.split_value = threshold;
        self.split_gain = gain;
        self.left_child = Some(left_child);
        self.right_child = Some(right_child);
    }

    /// Get the path that should be traveled down, given a value.
    pub fn get_child_idx(&self, v: f64) -> Option<usize> {
        if v <= self.split_value {
            self.left_child
        } else {
            self.right_child
        }
    }
}

impl fmt::Display for Node {
    // This trait requires `fmt` with this exact signature.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.split_feature, self.children()) {
            (Some(feature), Some((left, right))) => write!(
                f,
                "{}:[{} <= {}] yes={},no={},weight={},gain={},cover={}",
                self.num,
                feature,
                self.split_value,
                left,
                right,
                self.weight_value,
                self.split_gain,
                self.population()
            ),
            _ => write!(f, "{}:leaf={},cover={}", self.num, self.weight_value, self.population()),
        }
    }
}

/// Diagnostic summary of one applied split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub node: usize,
    pub depth: usize,
    pub feature: usize,
    pub threshold: f64,
    pub gain: f64,
    pub population: usize,
    pub left_population: usize,
    pub right_population: usize,
    pub weight_before: f64,
    pub left_weight: f64,
    pub right_weight: f64,
    pub left_child: usize,
    pub right_child: usize,
}

impl fmt::Display for SplitRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "node {} (depth {}) on feature {} <= {}: population {} -> ({}, {}), weight {} -> ({}, {}), gain {}",
            self.node,
            self.depth,
            self.feature,
            self.threshold,
            self.population,
            self.left_population,
            self.right_population,
            self.weight_before,
            self.left_weight,
            self.right_weight,
            self.gain
        )
    }
}

use crate::scorer::SplitDecision;
use serde::Deserialize;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::VecDeque;

/// A leaf waiting to be split, with the split its scorer proposed.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub node: usize,
    pub decision: SplitDecision,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher gain first, then the older node.
        self.decision
            .gain
            .total_cmp(&other.decision.gain)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Trait for handling the growth of the tree.
pub trait Grower {
    /// Add a node to the grower.
    fn add_node(&mut self, node: Candidate);
    /// Get the next node to split.
    fn get_next_node(&mut self) -> Option<Candidate>;
    /// Check if the grower is empty.
    fn is_empty(&self) -> bool;
}

impl Grower for BinaryHeap<Candidate> {
    fn add_node(&mut self, node: Candidate) {
        self.push(node);
    }

    fn get_next_node(&mut self) -> Option<Candidate> {
        self.pop()
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }
}

impl Grower for VecDeque<Candidate> {
    fn add_node(&mut self, node: Candidate) {
        self.push_front(node);
    }

    fn get_next_node(&mut self) -> Option<Candidate> {
        self.pop_back()
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }
}

impl Grower for Vec<Candidate> {
    fn add_node(&mut self, node: Candidate) {
        self.push(node);
    }

    fn get_next_node(&mut self) -> Option<Candidate> {
        self.pop()
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }
}

/// Policy for growing the tree.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrowPolicy {
    /// Depth-wise growth (level-wise).
    DepthWise,
    /// Finish one branch before starting the next.
    DepthFirst,
    /// Loss-guided growth (leaf-wise).
    LossGuide,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(node: usize, gain: f64) -> Candidate {
        Candidate {
            node,
            decision: SplitDecision {
                feature: 0,
                threshold: 0.5,
                gain,
                left_weight: 0.0,
                right_weight: 0.0,
            },
        }
    }

    fn drain<G: Grower>(mut g: G) -> Vec<usize> {
        for (node, gain) in [(0, 1.0), (1, 3.0), (2, 2.0), (3, 3.0)] {
            g.add_node(candidate(node, gain));
        }
        let mut order = Vec::new();
        while let Some(c) = g.get_next_node() {
            order.push(c.node);
        }
        assert!(g.is_empty());
        order
    }

    #[test]
    fn test_grower_orders() {
        assert_eq!(drain(BinaryHeap::<Candidate>::new()), vec![1, 3, 2, 0]);
        assert_eq!(drain(VecDeque::<Candidate>::new()), vec![0, 1, 2, 3]);
        assert_eq!(drain(Vec::<Candidate>::new()), vec![3, 2, 1, 0]);
    }
}

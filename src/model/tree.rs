//! Decision tree storage and traversal.
//!
//! Trees are stored struct-of-arrays: parallel vectors indexed by node id.
//! Node 0 is always the root. All splits are numeric (`value < threshold`
//! goes left); survey codes carry no missing values, so there is no
//! default-direction handling.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Node index within a [`Tree`].
pub type NodeId = u32;

/// A single boosted tree in SoA layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    split_index: Vec<u32>,
    threshold: Vec<f32>,
    left: Vec<NodeId>,
    right: Vec<NodeId>,
    leaf_value: Vec<f32>,
    is_leaf: Vec<bool>,
}

impl Tree {
    /// Create an empty tree. Push the root before using it.
    pub fn new() -> Self {
        Self {
            split_index: Vec::new(),
            threshold: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            leaf_value: Vec::new(),
            is_leaf: Vec::new(),
        }
    }

    /// A tree consisting of a single leaf.
    pub fn single_leaf(value: f32) -> Self {
        let mut tree = Self::new();
        tree.push_leaf(value);
        tree
    }

    /// Number of nodes.
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Number of leaf nodes.
    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    /// Append a leaf node, returning its id.
    pub fn push_leaf(&mut self, value: f32) -> NodeId {
        let id = self.n_nodes() as NodeId;
        self.split_index.push(0);
        self.threshold.push(0.0);
        self.left.push(0);
        self.right.push(0);
        self.leaf_value.push(value);
        self.is_leaf.push(true);
        id
    }

    /// Append a split node with children to be wired up later.
    pub fn push_split(&mut self, feature: u32, threshold: f32) -> NodeId {
        let id = self.n_nodes() as NodeId;
        self.split_index.push(feature);
        self.threshold.push(threshold);
        self.left.push(0);
        self.right.push(0);
        self.leaf_value.push(0.0);
        self.is_leaf.push(false);
        id
    }

    /// Wire the children of a split node.
    pub fn set_children(&mut self, node: NodeId, left: NodeId, right: NodeId) {
        debug_assert!(!self.is_leaf[node as usize]);
        self.left[node as usize] = left;
        self.right[node as usize] = right;
    }

    /// Whether a node is a leaf.
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    /// Leaf value at a leaf node.
    pub fn leaf_value(&self, node: NodeId) -> f32 {
        debug_assert!(self.is_leaf[node as usize]);
        self.leaf_value[node as usize]
    }

    /// Traverse from the root to a leaf for one sample.
    #[inline]
    pub fn traverse(&self, sample: ArrayView1<f32>) -> NodeId {
        let mut node = 0u32;
        while !self.is_leaf[node as usize] {
            let feat = self.split_index[node as usize] as usize;
            node = if sample[feat] < self.threshold[node as usize] {
                self.left[node as usize]
            } else {
                self.right[node as usize]
            };
        }
        node
    }

    /// Predict the leaf value for one sample.
    #[inline]
    pub fn predict_row(&self, sample: ArrayView1<f32>) -> f32 {
        self.leaf_value[self.traverse(sample) as usize]
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

// src/inference/model.rs
//! Random-forest gesture model evaluated in Q8.8 fixed point.
//!
//! A model holds up to 15 flattened decision trees of up to 63 nodes each,
//! plus per-feature normalisation tables baked in at training time. Every
//! structural constraint is checked once when the model is constructed, so
//! the per-window prediction path runs without bounds surprises.

use thiserror::Error;

use crate::config::constants::capacity::{
    MAX_CLASSES, MAX_FEATURES, MAX_NODES_PER_TREE, MAX_TREES,
};
use crate::inference::fixed::Fixed;
use crate::processing::features::FeatureVector;

/// A structurally invalid or undecodable model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A forest needs at least one tree.
    #[error("model contains no trees")]
    EmptyForest,

    /// More trees than the evaluator supports.
    #[error("model has {got} trees, limit is {max}")]
    TooManyTrees {
        /// Trees in the model.
        got: usize,
        /// Supported maximum.
        max: usize,
    },

    /// The class count must be non-zero and within the gesture set.
    #[error("model declares {got} classes, limit is {max}")]
    BadClassCount {
        /// Declared class count.
        got: u8,
        /// Supported maximum.
        max: usize,
    },

    /// The feature count must be non-zero and fit the feature vector.
    #[error("model declares {got} features, limit is {max}")]
    BadFeatureCount {
        /// Declared feature count.
        got: u8,
        /// Supported maximum.
        max: usize,
    },

    /// Normalisation tables must cover each declared feature exactly.
    #[error("normalisation table has {got} entries, expected {expected}")]
    BadScalingTable {
        /// Entries supplied.
        got: usize,
        /// Declared feature count.
        expected: usize,
    },

    /// A tree with no nodes cannot be evaluated.
    #[error("tree {0} has no nodes")]
    EmptyTree(usize),

    /// A tree exceeds the flattened node capacity.
    #[error("tree {tree} has {got} nodes, limit is {max}")]
    TooManyNodes {
        /// Index of the oversized tree.
        tree: usize,
        /// Nodes in the tree.
        got: usize,
        /// Supported maximum.
        max: usize,
    },

    /// The root index points outside the node array.
    #[error("tree {tree} root {root} outside its {nodes} nodes")]
    RootOutOfRange {
        /// Index of the broken tree.
        tree: usize,
        /// Declared root index.
        root: u8,
        /// Nodes in the tree.
        nodes: usize,
    },

    /// A split child points outside the node array.
    #[error("tree {tree} node {node} links to missing node {child}")]
    NodeIndexOutOfRange {
        /// Index of the broken tree.
        tree: usize,
        /// Node holding the bad link.
        node: u8,
        /// The out-of-range child index.
        child: u8,
    },

    /// A split tests a feature the model does not declare.
    #[error("tree {tree} node {node} tests undeclared feature {feature}")]
    FeatureIndexOutOfRange {
        /// Index of the broken tree.
        tree: usize,
        /// Node holding the bad split.
        node: u8,
        /// The out-of-range feature index.
        feature: u8,
    },

    /// A leaf predicts a class the model does not declare.
    #[error("tree {tree} node {node} predicts undeclared class {class}")]
    ClassOutOfRange {
        /// Index of the broken tree.
        tree: usize,
        /// Node holding the bad leaf.
        node: u8,
        /// The out-of-range class.
        class: u8,
    },

    /// Following the links from the root reaches some node twice.
    #[error("tree {0} contains a cycle or shared subtree")]
    CyclicTree(usize),

    /// The blob length does not match its declared layout.
    #[error("model blob is {got} bytes, layout requires {expected}")]
    UnexpectedLength {
        /// Bytes the layout requires.
        expected: usize,
        /// Bytes present.
        got: usize,
    },

    /// The blob does not start with the model magic.
    #[error("bad model magic {found:02x?}")]
    BadMagic {
        /// The four bytes found instead.
        found: [u8; 4],
    },

    /// The blob uses a format revision this build does not read.
    #[error("unsupported model format version {0}")]
    UnsupportedVersion(u8),

    /// The blob checksum does not match its payload.
    #[error("model checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the trailer.
        stored: u32,
        /// Checksum of the payload as read.
        computed: u32,
    },

    /// The model file could not be read.
    #[error("failed to read model file {path}")]
    Io {
        /// Path that failed to open.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while evaluating a valid model.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The feature vector length does not match the model.
    #[error("model expects {expected} features, vector has {got}")]
    FeatureCountMismatch {
        /// Features the model declares.
        expected: u8,
        /// Features in the vector.
        got: usize,
    },
}

/// One node of a flattened decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeNode {
    /// Terminal node carrying the predicted class.
    Leaf {
        /// Predicted gesture class.
        class: u8,
    },
    /// Binary split. Values less than or equal to the threshold go left.
    Split {
        /// Index into the feature vector.
        feature: u8,
        /// Q8.8 decision threshold.
        threshold: Fixed,
        /// Node index taken when the feature is at or below the threshold.
        left: u8,
        /// Node index taken otherwise.
        right: u8,
    },
}

/// A decision tree flattened into an indexed node array.
///
/// Construction performs no validation; [`ForestModel::new`] checks every
/// tree it adopts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    root: u8,
}

impl DecisionTree {
    /// Wraps a node array and root index.
    pub fn new(nodes: Vec<TreeNode>, root: u8) -> Self {
        Self { nodes, root }
    }

    /// Nodes in index order.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Index of the root node.
    pub fn root(&self) -> u8 {
        self.root
    }

    /// Walks the tree over normalised features.
    ///
    /// The walk is bounded by the node count, so a corrupt tree returns
    /// `None` instead of spinning.
    pub fn predict(&self, features: &[Fixed]) -> Option<u8> {
        let mut index = self.root as usize;
        for _ in 0..=self.nodes.len() {
            match *self.nodes.get(index)? {
                TreeNode::Leaf { class } => return Some(class),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = *features.get(feature as usize)?;
                    index = if value <= threshold {
                        left as usize
                    } else {
                        right as usize
                    };
                }
            }
        }
        None
    }
}

/// A classifier vote with its agreement level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    /// Predicted gesture class.
    pub class: u8,
    /// Percentage of trees that voted for the class.
    pub confidence: u8,
}

/// A validated random forest with its normalisation tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestModel {
    trees: Vec<DecisionTree>,
    n_features: u8,
    n_classes: u8,
    feature_scale: Vec<Fixed>,
    feature_offset: Vec<Fixed>,
}

impl ForestModel {
    /// Adopts trees and tables after checking every structural constraint.
    pub fn new(
        trees: Vec<DecisionTree>,
        n_features: u8,
        n_classes: u8,
        feature_scale: Vec<Fixed>,
        feature_offset: Vec<Fixed>,
    ) -> Result<Self, ModelError> {
        if trees.is_empty() {
            return Err(ModelError::EmptyForest);
        }
        if trees.len() > MAX_TREES {
            return Err(ModelError::TooManyTrees {
                got: trees.len(),
                max: MAX_TREES,
            });
        }
        if n_classes == 0 || n_classes as usize > MAX_CLASSES {
            return Err(ModelError::BadClassCount {
                got: n_classes,
                max: MAX_CLASSES,
            });
        }
        if n_features == 0 || n_features as usize > MAX_FEATURES {
            return Err(ModelError::BadFeatureCount {
                got: n_features,
                max: MAX_FEATURES,
            });
        }
        for table in [&feature_scale, &feature_offset] {
            if table.len() != n_features as usize {
                return Err(ModelError::BadScalingTable {
                    got: table.len(),
                    expected: n_features as usize,
                });
            }
        }
        for (tree_index, tree) in trees.iter().enumerate() {
            validate_tree(tree_index, tree, n_features, n_classes)?;
        }
        Ok(Self {
            trees,
            n_features,
            n_classes,
            feature_scale,
            feature_offset,
        })
    }

    /// Trees in evaluation order.
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Number of trees in the forest.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Features the model expects per vector.
    pub fn n_features(&self) -> u8 {
        self.n_features
    }

    /// Gesture classes the model can predict.
    pub fn n_classes(&self) -> u8 {
        self.n_classes
    }

    /// Per-feature multiplier table.
    pub fn feature_scale(&self) -> &[Fixed] {
        &self.feature_scale
    }

    /// Per-feature offset table.
    pub fn feature_offset(&self) -> &[Fixed] {
        &self.feature_offset
    }

    /// Runs every tree over the normalised vector and majority-votes.
    ///
    /// Confidence is the integer percentage of agreeing trees. Vote ties
    /// resolve to the lowest class index.
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError> {
        if features.len() != self.n_features as usize {
            return Err(InferenceError::FeatureCountMismatch {
                expected: self.n_features,
                got: features.len(),
            });
        }

        let mut normalized = [Fixed::ZERO; MAX_FEATURES];
        for (i, &value) in features.values().iter().enumerate() {
            normalized[i] = Fixed::from_f32(value)
                .saturating_sub(self.feature_offset[i])
                .saturating_mul(self.feature_scale[i]);
        }
        let normalized = &normalized[..features.len()];

        let mut votes = [0u32; MAX_CLASSES];
        for tree in &self.trees {
            if let Some(class) = tree.predict(normalized) {
                votes[class as usize] += 1;
            }
        }

        let mut best_class = 0u8;
        let mut best_votes = 0u32;
        for (class, &count) in votes.iter().enumerate() {
            if count > best_votes {
                best_votes = count;
                best_class = class as u8;
            }
        }
        let confidence = (best_votes * 100 / self.trees.len() as u32) as u8;
        Ok(Prediction {
            class: best_class,
            confidence,
        })
    }
}

fn validate_tree(
    tree_index: usize,
    tree: &DecisionTree,
    n_features: u8,
    n_classes: u8,
) -> Result<(), ModelError> {
    let node_count = tree.nodes.len();
    if node_count == 0 {
        return Err(ModelError::EmptyTree(tree_index));
    }
    if node_count > MAX_NODES_PER_TREE {
        return Err(ModelError::TooManyNodes {
            tree: tree_index,
            got: node_count,
            max: MAX_NODES_PER_TREE,
        });
    }
    if tree.root as usize >= node_count {
        return Err(ModelError::RootOutOfRange {
            tree: tree_index,
            root: tree.root,
            nodes: node_count,
        });
    }

    // Walk the links once; node indexes fit a u64 visit mask.
    let mut visited = 0u64;
    let mut stack = vec![tree.root];
    while let Some(index) = stack.pop() {
        let bit = 1u64 << index;
        if visited & bit != 0 {
            return Err(ModelError::CyclicTree(tree_index));
        }
        visited |= bit;
        match tree.nodes[index as usize] {
            TreeNode::Leaf { class } => {
                if class >= n_classes {
                    return Err(ModelError::ClassOutOfRange {
                        tree: tree_index,
                        node: index,
                        class,
                    });
                }
            }
            TreeNode::Split {
                feature,
                left,
                right,
                ..
            } => {
                if feature >= n_features {
                    return Err(ModelError::FeatureIndexOutOfRange {
                        tree: tree_index,
                        node: index,
                        feature,
                    });
                }
                for child in [left, right] {
                    if child as usize >= node_count {
                        return Err(ModelError::NodeIndexOutOfRange {
                            tree: tree_index,
                            node: index,
                            child,
                        });
                    }
                    stack.push(child);
                }
            }
        }
    }
    Ok(())
}

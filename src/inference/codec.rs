// src/inference/codec.rs
//! Binary model format.
//!
//! A model blob is a fixed-layout little-endian image:
//!
//! ```text
//! magic "RFGM" | version | n_trees | n_features | n_classes
//! per tree: n_nodes | root | 63 node records of 8 bytes each
//! node record: feature | tag | threshold i16 | left | right | pad x2
//! 30 x i16 scale table | 30 x i16 offset table
//! crc32 of everything above
//! ```
//!
//! Records past `n_nodes` and table entries past `n_features` are zero
//! padding, so every blob with the same tree count has the same size. The
//! tag byte marks leaves with the high bit and stores the class in the low
//! seven bits. Decoding verifies the checksum before touching the payload
//! and hands the result to [`ForestModel::new`] for structural validation.

use std::path::Path;

use crate::config::constants::capacity::{MAX_CLASSES, MAX_FEATURES, MAX_NODES_PER_TREE};
use crate::inference::fixed::Fixed;
use crate::inference::model::{DecisionTree, ForestModel, ModelError, TreeNode};

/// First four bytes of every model blob.
pub const MODEL_MAGIC: [u8; 4] = *b"RFGM";

/// Format revision this build reads and writes.
pub const MODEL_VERSION: u8 = 1;

const HEADER_BYTES: usize = 8;
const NODE_RECORD_BYTES: usize = 8;
const TREE_BYTES: usize = 2 + MAX_NODES_PER_TREE * NODE_RECORD_BYTES;
const TABLE_BYTES: usize = MAX_FEATURES * 2;
const CHECKSUM_BYTES: usize = 4;

const LEAF_FLAG: u8 = 0x80;
const CLASS_MASK: u8 = 0x7F;

const fn blob_len(n_trees: usize) -> usize {
    HEADER_BYTES + n_trees * TREE_BYTES + 2 * TABLE_BYTES + CHECKSUM_BYTES
}

/// Serialises a model into its blob image.
pub fn encode_model(model: &ForestModel) -> Vec<u8> {
    let mut blob = Vec::with_capacity(blob_len(model.n_trees()));
    blob.extend_from_slice(&MODEL_MAGIC);
    blob.push(MODEL_VERSION);
    blob.push(model.n_trees() as u8);
    blob.push(model.n_features());
    blob.push(model.n_classes());

    for tree in model.trees() {
        blob.push(tree.nodes().len() as u8);
        blob.push(tree.root());
        for node in tree.nodes() {
            match *node {
                TreeNode::Leaf { class } => {
                    blob.push(0);
                    blob.push(LEAF_FLAG | class);
                    blob.extend_from_slice(&[0; 6]);
                }
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    blob.push(feature);
                    blob.push(0);
                    blob.extend_from_slice(&threshold.raw().to_le_bytes());
                    blob.push(left);
                    blob.push(right);
                    blob.extend_from_slice(&[0; 2]);
                }
            }
        }
        let padding = MAX_NODES_PER_TREE - tree.nodes().len();
        blob.extend(std::iter::repeat(0u8).take(padding * NODE_RECORD_BYTES));
    }

    for table in [model.feature_scale(), model.feature_offset()] {
        for entry in table {
            blob.extend_from_slice(&entry.raw().to_le_bytes());
        }
        for _ in table.len()..MAX_FEATURES {
            blob.extend_from_slice(&[0; 2]);
        }
    }

    let checksum = crc32fast::hash(&blob);
    blob.extend_from_slice(&checksum.to_le_bytes());
    blob
}

/// Parses and validates a model blob.
pub fn decode_model(data: &[u8]) -> Result<ForestModel, ModelError> {
    if data.len() < blob_len(0) {
        return Err(ModelError::UnexpectedLength {
            expected: blob_len(0),
            got: data.len(),
        });
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&data[..4]);
    if magic != MODEL_MAGIC {
        return Err(ModelError::BadMagic { found: magic });
    }
    if data[4] != MODEL_VERSION {
        return Err(ModelError::UnsupportedVersion(data[4]));
    }
    let n_trees = data[5] as usize;
    let n_features = data[6];
    let n_classes = data[7];

    // The blob length fixes the table region at MAX_FEATURES entries, so
    // the declared count must be bounded before the tables are read.
    if n_features == 0 || n_features as usize > MAX_FEATURES {
        return Err(ModelError::BadFeatureCount {
            got: n_features,
            max: MAX_FEATURES,
        });
    }
    if n_classes == 0 || n_classes as usize > MAX_CLASSES {
        return Err(ModelError::BadClassCount {
            got: n_classes,
            max: MAX_CLASSES,
        });
    }

    let expected = blob_len(n_trees);
    if data.len() != expected {
        return Err(ModelError::UnexpectedLength {
            expected,
            got: data.len(),
        });
    }

    let payload = &data[..data.len() - CHECKSUM_BYTES];
    let stored = u32::from_le_bytes([
        data[data.len() - 4],
        data[data.len() - 3],
        data[data.len() - 2],
        data[data.len() - 1],
    ]);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(ModelError::ChecksumMismatch { stored, computed });
    }

    let mut trees = Vec::with_capacity(n_trees);
    for tree_index in 0..n_trees {
        let base = HEADER_BYTES + tree_index * TREE_BYTES;
        let n_nodes = data[base] as usize;
        let root = data[base + 1];
        if n_nodes > MAX_NODES_PER_TREE {
            return Err(ModelError::TooManyNodes {
                tree: tree_index,
                got: n_nodes,
                max: MAX_NODES_PER_TREE,
            });
        }

        let mut nodes = Vec::with_capacity(n_nodes);
        for node_index in 0..n_nodes {
            let record = &data[base + 2 + node_index * NODE_RECORD_BYTES..];
            let tag = record[1];
            if tag & LEAF_FLAG != 0 {
                nodes.push(TreeNode::Leaf {
                    class: tag & CLASS_MASK,
                });
            } else {
                nodes.push(TreeNode::Split {
                    feature: record[0],
                    threshold: Fixed::from_raw(i16::from_le_bytes([record[2], record[3]])),
                    left: record[4],
                    right: record[5],
                });
            }
        }
        trees.push(DecisionTree::new(nodes, root));
    }

    let tables_base = HEADER_BYTES + n_trees * TREE_BYTES;
    let read_table = |offset: usize| -> Vec<Fixed> {
        (0..n_features as usize)
            .map(|i| {
                let at = offset + i * 2;
                Fixed::from_raw(i16::from_le_bytes([data[at], data[at + 1]]))
            })
            .collect()
    };
    let feature_scale = read_table(tables_base);
    let feature_offset = read_table(tables_base + TABLE_BYTES);

    ForestModel::new(trees, n_features, n_classes, feature_scale, feature_offset)
}

/// Reads and decodes a model file.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ForestModel, ModelError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    decode_model(&data)
}

/// Encodes a model and writes its blob to a file.
pub fn save_model<P: AsRef<Path>>(model: &ForestModel, path: P) -> Result<(), ModelError> {
    let path = path.as_ref();
    std::fs::write(path, encode_model(model)).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })
}

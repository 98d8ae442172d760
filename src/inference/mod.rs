// src/inference/mod.rs
//! Fixed-point gesture inference: model, codec, classifier and smoothing.

pub mod classifier;
pub mod codec;
pub mod fixed;
pub mod model;
pub mod voting;

pub use classifier::Classifier;
pub use codec::{decode_model, encode_model, load_model, save_model};
pub use fixed::Fixed;
pub use model::{DecisionTree, ForestModel, InferenceError, ModelError, Prediction, TreeNode};
pub use voting::VotingBuffer;

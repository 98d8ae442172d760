// src/inference/classifier.rs
//! Model wrapper with a degraded mode.
//!
//! A pipeline whose model fails to load keeps acquiring and conditioning
//! signal, but the classifier stops voting. The wrapper records the load
//! failure so the fault stays observable instead of looking like a silent
//! prosthesis.

use std::path::Path;

use tracing::{error, warn};

use crate::inference::codec;
use crate::inference::model::{ForestModel, ModelError, Prediction};
use crate::processing::features::FeatureVector;

#[derive(Debug)]
enum State {
    Active(ForestModel),
    Disabled(ModelError),
}

/// Gesture classifier, either active or degraded.
#[derive(Debug)]
pub struct Classifier {
    state: State,
}

impl Classifier {
    /// Wraps an already validated model.
    pub fn new(model: ForestModel) -> Self {
        Self {
            state: State::Active(model),
        }
    }

    /// Builds a classifier that never predicts, keeping the cause.
    pub fn disabled(error: ModelError) -> Self {
        Self {
            state: State::Disabled(error),
        }
    }

    /// Decodes a model blob, degrading instead of failing.
    pub fn from_blob(data: &[u8]) -> Self {
        match codec::decode_model(data) {
            Ok(model) => Self::new(model),
            Err(err) => {
                error!("model blob rejected, classifier disabled: {err}");
                Self::disabled(err)
            }
        }
    }

    /// Loads a model file, degrading instead of failing.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Self {
        match codec::load_model(path) {
            Ok(model) => Self::new(model),
            Err(err) => {
                error!("model load failed, classifier disabled: {err}");
                Self::disabled(err)
            }
        }
    }

    /// Whether predictions are being produced.
    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active(_))
    }

    /// The load failure that degraded the classifier, if any.
    pub fn fault(&self) -> Option<&ModelError> {
        match &self.state {
            State::Active(_) => None,
            State::Disabled(err) => Some(err),
        }
    }

    /// The wrapped model while active.
    pub fn model(&self) -> Option<&ForestModel> {
        match &self.state {
            State::Active(model) => Some(model),
            State::Disabled(_) => None,
        }
    }

    /// Classifies one feature vector, or `None` in degraded mode.
    pub fn predict(&self, features: &FeatureVector) -> Option<Prediction> {
        match &self.state {
            State::Active(model) => match model.predict(features) {
                Ok(prediction) => Some(prediction),
                Err(err) => {
                    warn!("prediction skipped: {err}");
                    None
                }
            },
            State::Disabled(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::fixed::Fixed;
    use crate::inference::model::{DecisionTree, TreeNode};

    fn tiny_model() -> ForestModel {
        ForestModel::new(
            vec![DecisionTree::new(vec![TreeNode::Leaf { class: 1 }], 0)],
            1,
            2,
            vec![Fixed::ONE],
            vec![Fixed::ZERO],
        )
        .unwrap()
    }

    fn vector_of(values: &[f32]) -> FeatureVector {
        let mut vector = FeatureVector::new(0);
        for &value in values {
            vector.push(value);
        }
        vector
    }

    #[test]
    fn test_active_classifier_predicts() {
        let classifier = Classifier::new(tiny_model());
        assert!(classifier.is_active());
        assert!(classifier.fault().is_none());
        let prediction = classifier.predict(&vector_of(&[0.5])).unwrap();
        assert_eq!(prediction.class, 1);
        assert_eq!(prediction.confidence, 100);
    }

    #[test]
    fn test_garbage_blob_degrades() {
        let classifier = Classifier::from_blob(b"not a model");
        assert!(!classifier.is_active());
        assert!(matches!(
            classifier.fault(),
            Some(ModelError::UnexpectedLength { .. })
        ));
        assert_eq!(classifier.predict(&vector_of(&[0.5])), None);
    }

    #[test]
    fn test_missing_file_degrades() {
        let classifier = Classifier::from_file("/nonexistent/gestures.rfgm");
        assert!(matches!(classifier.fault(), Some(ModelError::Io { .. })));
    }

    #[test]
    fn test_round_trip_through_blob() {
        let blob = codec::encode_model(&tiny_model());
        let classifier = Classifier::from_blob(&blob);
        assert!(classifier.is_active());
        assert_eq!(classifier.model().unwrap().n_trees(), 1);
    }

    #[test]
    fn test_length_mismatch_yields_no_prediction() {
        let classifier = Classifier::new(tiny_model());
        assert_eq!(classifier.predict(&vector_of(&[0.5, 0.5])), None);
    }
}

// tests/model_codec_tests.rs
//! Round trips between in-memory forests, blobs on disk and the classifier.

use gesture_core::inference::{
    encode_model, load_model, save_model, Classifier, DecisionTree, Fixed, ForestModel,
    ModelError, TreeNode,
};
use gesture_core::processing::FeatureVector;

/// Three-tree forest over two features with non-identity normalization.
fn sample_model() -> ForestModel {
    let stump = |threshold: f32, low: u8, high: u8| {
        DecisionTree::new(
            vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: Fixed::from_f32(threshold),
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { class: low },
                TreeNode::Leaf { class: high },
            ],
            0,
        )
    };
    let trees = vec![stump(0.5, 0, 3), stump(1.0, 0, 3), stump(-2.0, 1, 3)];
    let scale = vec![Fixed::from_f32(2.0), Fixed::ONE];
    let offset = vec![Fixed::from_f32(0.25), Fixed::ZERO];
    ForestModel::new(trees, 2, 4, scale, offset).unwrap()
}

fn vector_of(values: &[f32]) -> FeatureVector {
    let mut vector = FeatureVector::new(0);
    for value in values {
        vector.push(*value);
    }
    vector
}

#[test]
fn test_save_then_load_preserves_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rfgm");
    let model = sample_model();

    save_model(&model, &path).unwrap();
    let loaded = load_model(&path).unwrap();
    assert_eq!(loaded, model);
}

#[test]
fn test_loaded_model_predicts_like_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rfgm");
    let model = sample_model();
    save_model(&model, &path).unwrap();
    let loaded = load_model(&path).unwrap();

    for raw in [-3.0f32, -0.5, 0.0, 0.2, 0.6, 2.5] {
        let features = vector_of(&[raw, 0.0]);
        assert_eq!(
            loaded.predict(&features).unwrap(),
            model.predict(&features).unwrap(),
            "diverged at input {raw}"
        );
    }
}

#[test]
fn test_load_rejects_flipped_byte() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rfgm");
    let model = sample_model();
    save_model(&model, &path).unwrap();

    let mut blob = std::fs::read(&path).unwrap();
    let mid = blob.len() / 2;
    blob[mid] ^= 0x08;
    std::fs::write(&path, &blob).unwrap();

    match load_model(&path) {
        Err(ModelError::ChecksumMismatch { stored, computed }) => {
            assert_ne!(stored, computed);
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
}

#[test]
fn test_load_missing_file_names_the_path() {
    let err = load_model("/nonexistent/forest.rfgm").unwrap_err();
    match &err {
        ModelError::Io { path, .. } => assert!(path.contains("forest.rfgm")),
        other => panic!("expected io error, got {other:?}"),
    }
    assert!(err.to_string().contains("forest.rfgm"));
}

#[test]
fn test_truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rfgm");
    let model = sample_model();
    save_model(&model, &path).unwrap();

    let blob = std::fs::read(&path).unwrap();
    std::fs::write(&path, &blob[..blob.len() - 10]).unwrap();

    assert!(matches!(
        load_model(&path),
        Err(ModelError::UnexpectedLength { .. })
    ));
}

#[test]
fn test_classifier_from_file_runs_the_loaded_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rfgm");
    save_model(&sample_model(), &path).unwrap();

    let classifier = Classifier::from_file(&path);
    assert!(classifier.is_active());
    assert!(classifier.fault().is_none());

    // 0.2 normalizes to (0.2 - 0.25) * 2 = -0.1, left of every stump
    // threshold except the -2.0 one, so classes 0, 0, 3: majority 0.
    let prediction = classifier.predict(&vector_of(&[0.2, 0.0])).unwrap();
    assert_eq!(prediction.class, 0);
    assert_eq!(prediction.confidence, 66);
}

#[test]
fn test_classifier_degrades_on_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.rfgm");
    std::fs::write(&path, b"not a model at all").unwrap();

    let classifier = Classifier::from_file(&path);
    assert!(!classifier.is_active());
    assert!(classifier.fault().is_some());
    assert!(classifier.predict(&vector_of(&[0.0, 0.0])).is_none());
}

#[test]
fn test_encode_is_deterministic() {
    let a = encode_model(&sample_model());
    let b = encode_model(&sample_model());
    assert_eq!(a, b);
}

// demos/pipeline_demo.rs
//! Runs the full pipeline against the synthetic source, cycling through four
//! fingerspelling letters, and prints every decision that clears the gate.
//!
//! The demo forest splits on the scaled channel-0 RMS feature; the synthetic
//! source weights channel 0 differently per class, so the four letters
//! separate cleanly. Watch the vote smoothing ride out the mixed windows at
//! each letter boundary.

use std::error::Error;
use std::thread;
use std::time::Duration;

use gesture_core::acquisition::{SignalSource, SourceError, SyntheticSource};
use gesture_core::config::FeatureScale;
use gesture_core::gestures;
use gesture_core::inference::{save_model, DecisionTree, ForestModel, ModelError, TreeNode};
use gesture_core::{Classifier, DecisionSink, Fixed, GestureDecision, Pipeline, PipelineConfig};

const CLASS_CYCLE: [u8; 4] = [0, 1, 2, 3];
// Three seconds per letter at the 1 kHz default rate.
const FRAMES_PER_CLASS: u64 = 3000;

/// Synthetic source that renders the next letter every few seconds.
struct CyclingSource {
    inner: SyntheticSource,
    emitted: u64,
}

impl SignalSource for CyclingSource {
    fn read_frames(&mut self, out: &mut [[i32; 4]]) -> Result<usize, SourceError> {
        let slot = (self.emitted / FRAMES_PER_CLASS) as usize % CLASS_CYCLE.len();
        self.inner.set_gesture(CLASS_CYCLE[slot]);
        let n = self.inner.read_frames(out)?;
        self.emitted += n as u64;
        Ok(n)
    }
}

struct StdoutSink;

impl DecisionSink for StdoutSink {
    fn deliver(&mut self, decision: GestureDecision) {
        println!("  decided {decision}");
    }
}

/// Three jittered trees splitting the scaled channel-0 RMS into four classes.
fn demo_model(n_features: u8) -> Result<ForestModel, ModelError> {
    let tree = |jitter: f32| {
        DecisionTree::new(
            vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: Fixed::from_f32(1.03 + jitter),
                    left: 1,
                    right: 2,
                },
                TreeNode::Split {
                    feature: 0,
                    threshold: Fixed::from_f32(0.66 + jitter),
                    left: 3,
                    right: 4,
                },
                TreeNode::Split {
                    feature: 0,
                    threshold: Fixed::from_f32(1.40 + jitter),
                    left: 5,
                    right: 6,
                },
                TreeNode::Leaf { class: 0 },
                TreeNode::Leaf { class: 1 },
                TreeNode::Leaf { class: 2 },
                TreeNode::Leaf { class: 3 },
            ],
            0,
        )
    };
    let trees = vec![tree(0.0), tree(0.02), tree(-0.02)];
    let scale = vec![Fixed::ONE; n_features as usize];
    let offset = vec![Fixed::ZERO; n_features as usize];
    ForestModel::new(
        trees,
        n_features,
        gestures::GESTURE_CLASSES as u8,
        scale,
        offset,
    )
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut config = PipelineConfig::default();
    config.acquisition.channel_mask = 0b0001;
    // Millivolt-scale features would vanish in Q8.8; scale volts up by 1000.
    config.features.scaling = Some(vec![
        FeatureScale {
            scale: 1000.0,
            offset: 0.0,
        };
        config.feature_count()
    ]);

    // Round-trip the model through a blob on disk, as a deployment would.
    let model = demo_model(config.feature_count() as u8)?;
    let path = std::env::temp_dir().join("gesture-demo.rfgm");
    save_model(&model, &path)?;
    let classifier = Classifier::from_file(&path);

    let source = CyclingSource {
        inner: SyntheticSource::new(config.acquisition.sample_rate_hz, 42).paced(true),
        emitted: 0,
    };

    let pipeline = Pipeline::start(config, Box::new(source), classifier, Box::new(StdoutSink))?;
    let context = pipeline.context();

    for class in CLASS_CYCLE {
        let letter = gestures::label(class).unwrap_or("?");
        println!("rendering {letter} for three seconds");
        thread::sleep(Duration::from_secs(3));
    }

    pipeline.pause()?;
    println!("paused; the stream is discarded while parked");
    thread::sleep(Duration::from_secs(1));
    pipeline.resume()?;
    println!("resumed");
    thread::sleep(Duration::from_secs(2));

    println!("{:#?}", context.snapshot());
    pipeline.shutdown()?;
    Ok(())
}

// src/lib.rs
//! Real-time surface-EMG gesture recognition for prosthetic hand control.
//!
//! The crate turns a stream of raw multichannel converter codes into
//! discrete gesture decisions. It provides:
//!
//! - A block-exchange acquisition layer behind a pluggable [`SignalSource`]
//! - Sliding-window conditioning and time/frequency feature extraction
//! - Fixed-point random-forest inference with temporal vote smoothing
//! - A threaded [`Pipeline`] with pause, resume and live statistics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gesture_core::{
//!     Classifier, DecisionSink, GestureDecision, Pipeline, PipelineConfig, SyntheticSource,
//! };
//!
//! struct Printer;
//!
//! impl DecisionSink for Printer {
//!     fn deliver(&mut self, decision: GestureDecision) {
//!         println!("{decision}");
//!     }
//! }
//!
//! fn main() -> Result<(), gesture_core::PipelineError> {
//!     let config = PipelineConfig::default();
//!     let classifier = Classifier::from_file("model.rfgm");
//!     let source = SyntheticSource::new(config.acquisition.sample_rate_hz, 7).paced(true);
//!     let pipeline = Pipeline::start(config, Box::new(source), classifier, Box::new(Printer))?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(2));
//!     println!("{:?}", pipeline.snapshot());
//!     pipeline.shutdown()
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod gestures;
pub mod inference;
pub mod pipeline;
pub mod processing;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{SignalSource, SourceError, SyntheticSource};
pub use config::{ConfigError, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use inference::{Classifier, Fixed, ForestModel, Prediction};
pub use pipeline::{
    DecisionSink, GestureDecision, Pipeline, PipelineContext, PipelineMode, StatsSnapshot,
    WindowPhase,
};
pub use processing::{FeatureExtractor, FeatureVector, SignalConditioner, SlidingWindow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "gesture-core");
    }
}

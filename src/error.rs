// src/error.rs
//! Crate-level error type for pipeline construction and control.

use thiserror::Error;

use crate::config::ConfigError;
use crate::inference::ModelError;

/// Convenience alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced while building or controlling a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The model failed to load or validate.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A stage thread could not be spawned.
    #[error("failed to spawn {stage} stage thread")]
    Spawn {
        /// Stage whose thread failed to start.
        stage: &'static str,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// A control request was not acknowledged by every stage in time.
    #[error("pipeline {0} was not acknowledged in time")]
    ControlTimeout(&'static str),

    /// A stage thread panicked and its work is lost.
    #[error("{stage} stage thread panicked")]
    StagePanicked {
        /// Stage whose thread went down.
        stage: &'static str,
    },
}

// src/config/mod.rs
//! Pipeline configuration: typed sections, defaults, validation, TOML loading.

pub mod constants;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use constants::{adc, capacity, spectral};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}")]
    Io {
        /// Path that failed to open.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Sampling rate of zero cannot drive the pipeline.
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,

    /// Gain values are restricted to the front-end PGA steps.
    #[error("gain {0} is not an ADS1299 PGA step")]
    InvalidGain(u8),

    /// Block size must fit the acquisition block capacity.
    #[error("block size {size} outside 1..={max}")]
    BlockSizeOutOfRange {
        /// Configured size.
        size: usize,
        /// Block capacity.
        max: usize,
    },

    /// The channel mask selects no channel within the supported set.
    #[error("channel mask {mask:#06b} selects no valid channels")]
    InvalidChannelMask {
        /// Configured mask.
        mask: u8,
    },

    /// Window size must be even (for the 50 % hop) and fit the buffers.
    #[error("window size {size} must be even and within {min}..={max}")]
    WindowSizeOutOfRange {
        /// Configured size.
        size: usize,
        /// Smallest supported window.
        min: usize,
        /// Largest supported window.
        max: usize,
    },

    /// A filter corner must sit strictly between DC and Nyquist.
    #[error("{filter} frequency {frequency} Hz outside (0, {nyquist}) Hz")]
    FilterFrequencyOutOfRange {
        /// Which filter the frequency belongs to.
        filter: &'static str,
        /// Configured frequency.
        frequency: f32,
        /// Nyquist frequency for the configured sample rate.
        nyquist: f32,
    },

    /// Notch quality factor must be positive.
    #[error("notch quality factor must be positive, got {0}")]
    InvalidNotchQ(f32),

    /// Zero-crossing threshold must be a finite, non-negative voltage.
    #[error("zero-crossing threshold must be finite and non-negative, got {0}")]
    InvalidZcThreshold(f32),

    /// Confidence is a percentage.
    #[error("confidence threshold {0} exceeds 100")]
    ConfidenceThresholdOutOfRange(u8),

    /// Every inter-stage queue needs at least one slot.
    #[error("{queue} queue depth must be at least 1")]
    ZeroQueueDepth {
        /// Which queue is misconfigured.
        queue: &'static str,
    },

    /// Stage poll timeouts must be non-zero to bound the waits.
    #[error("{timeout} timeout must be non-zero")]
    ZeroTimeout {
        /// Which timeout is misconfigured.
        timeout: &'static str,
    },

    /// Feature scaling tables must cover the assembled vector exactly.
    #[error("feature scaling table has {got} entries, expected {expected}")]
    ScalingTableLength {
        /// Entries supplied.
        got: usize,
        /// Entries the assembled vector needs.
        expected: usize,
    },

    /// The loaded model disagrees with the configured feature layout.
    #[error("model expects {model} features but the pipeline assembles {assembled}")]
    FeatureCountMismatch {
        /// Feature count baked into the model.
        model: usize,
        /// Feature count the configuration produces.
        assembled: usize,
    },
}

/// Complete pipeline configuration.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PipelineConfig {
    /// Front-end and block accumulation settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Filtering applied before feature extraction.
    #[serde(default)]
    pub conditioning: ConditioningConfig,
    /// Windowing and feature assembly settings.
    #[serde(default)]
    pub features: FeatureConfig,
    /// Vote smoothing and the actuation gate.
    #[serde(default)]
    pub voting: VotingConfig,
    /// Inter-stage queue depths and stage poll timeouts.
    #[serde(default)]
    pub queues: QueueConfig,
}

/// Acquisition front-end settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AcquisitionConfig {
    /// Sampling rate of the front-end in Hz.
    #[serde(default = "defaults::sample_rate_hz")]
    pub sample_rate_hz: u32,

    /// PGA gain the raw codes are referred through.
    #[serde(default = "defaults::gain")]
    pub gain: u8,

    /// Frames accumulated before a block is published.
    #[serde(default = "defaults::block_size")]
    pub block_size: usize,

    /// Bit mask of enabled channels, LSB first.
    #[serde(default = "defaults::channel_mask")]
    pub channel_mask: u8,

    /// Acquisition wait on the exchange slot in milliseconds.
    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Signal conditioning settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConditioningConfig {
    /// High-pass cutoff in Hz for motion-artifact removal.
    #[serde(default = "defaults::highpass_cutoff_hz")]
    pub highpass_cutoff_hz: f32,

    /// Mains interference notch centre in Hz.
    #[serde(default = "defaults::notch_freq_hz")]
    pub notch_freq_hz: f32,

    /// Quality factor of the mains notch.
    #[serde(default = "defaults::notch_q")]
    pub notch_q: f32,
}

/// Per-feature rescaling pair: `scaled = (value - offset) * scale`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct FeatureScale {
    /// Multiplier applied after the offset is removed.
    pub scale: f32,
    /// Offset removed before scaling.
    pub offset: f32,
}

/// Windowing and feature assembly settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeatureConfig {
    /// Samples per analysis window; the hop is half of it.
    #[serde(default = "defaults::window_size")]
    pub window_size: usize,

    /// Rectified amplitude in volts below which sign changes count as noise.
    #[serde(default = "defaults::zc_threshold")]
    pub zc_threshold: f32,

    /// Compute one spectrum over the channel average instead of per channel.
    #[serde(default = "defaults::aggregate_spectrum")]
    pub aggregate_spectrum: bool,

    /// Optional per-feature rescaling, one entry per assembled feature.
    #[serde(default)]
    pub scaling: Option<Vec<FeatureScale>>,
}

/// Vote smoothing and the actuation gate.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VotingConfig {
    /// Smoothed confidence must exceed this percentage to actuate.
    #[serde(default = "defaults::confidence_threshold")]
    pub confidence_threshold: u8,
}

/// Inter-stage queue depths and stage poll timeouts.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct QueueConfig {
    /// Depth of the block queue between acquisition and conditioning.
    #[serde(default = "defaults::block_queue_depth")]
    pub block_queue_depth: usize,

    /// Depth of the feature queue between conditioning and inference.
    #[serde(default = "defaults::feature_queue_depth")]
    pub feature_queue_depth: usize,

    /// Depth of the vote queue between inference and decision.
    #[serde(default = "defaults::vote_queue_depth")]
    pub vote_queue_depth: usize,

    /// Decision stage inbound wait in milliseconds.
    #[serde(default = "defaults::decide_timeout_ms")]
    pub decide_timeout_ms: u64,
}

/// Default value providers backed by the constants module.
mod defaults {
    use super::constants::defaults as d;

    pub fn sample_rate_hz() -> u32 {
        d::SAMPLE_RATE_HZ
    }
    pub fn gain() -> u8 {
        d::GAIN
    }
    pub fn block_size() -> usize {
        d::BLOCK_SIZE
    }
    pub fn channel_mask() -> u8 {
        d::CHANNEL_MASK
    }
    pub fn read_timeout_ms() -> u64 {
        d::READ_TIMEOUT_MS
    }
    pub fn highpass_cutoff_hz() -> f32 {
        d::HIGHPASS_CUTOFF_HZ
    }
    pub fn notch_freq_hz() -> f32 {
        d::NOTCH_FREQ_HZ
    }
    pub fn notch_q() -> f32 {
        d::NOTCH_Q
    }
    pub fn window_size() -> usize {
        d::WINDOW_SIZE
    }
    pub fn zc_threshold() -> f32 {
        d::ZC_THRESHOLD_VOLTS
    }
    pub fn aggregate_spectrum() -> bool {
        true
    }
    pub fn confidence_threshold() -> u8 {
        d::CONFIDENCE_THRESHOLD
    }
    pub fn block_queue_depth() -> usize {
        d::BLOCK_QUEUE_DEPTH
    }
    pub fn feature_queue_depth() -> usize {
        d::FEATURE_QUEUE_DEPTH
    }
    pub fn vote_queue_depth() -> usize {
        d::VOTE_QUEUE_DEPTH
    }
    pub fn decide_timeout_ms() -> u64 {
        d::DECIDE_TIMEOUT_MS
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: defaults::sample_rate_hz(),
            gain: defaults::gain(),
            block_size: defaults::block_size(),
            channel_mask: defaults::channel_mask(),
            read_timeout_ms: defaults::read_timeout_ms(),
        }
    }
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            highpass_cutoff_hz: defaults::highpass_cutoff_hz(),
            notch_freq_hz: defaults::notch_freq_hz(),
            notch_q: defaults::notch_q(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_size: defaults::window_size(),
            zc_threshold: defaults::zc_threshold(),
            aggregate_spectrum: defaults::aggregate_spectrum(),
            scaling: None,
        }
    }
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: defaults::confidence_threshold(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            block_queue_depth: defaults::block_queue_depth(),
            feature_queue_depth: defaults::feature_queue_depth(),
            vote_queue_depth: defaults::vote_queue_depth(),
            decide_timeout_ms: defaults::decide_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    /// Loads and validates a configuration from a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every cross-field constraint the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.acquisition.sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if !adc::PGA_GAINS.contains(&self.acquisition.gain) {
            return Err(ConfigError::InvalidGain(self.acquisition.gain));
        }
        if !(1..=capacity::BLOCK_CAPACITY).contains(&self.acquisition.block_size) {
            return Err(ConfigError::BlockSizeOutOfRange {
                size: self.acquisition.block_size,
                max: capacity::BLOCK_CAPACITY,
            });
        }
        let mask = self.acquisition.channel_mask;
        if mask == 0 || mask & !((1u8 << capacity::CHANNELS) - 1) != 0 {
            return Err(ConfigError::InvalidChannelMask { mask });
        }
        if self.acquisition.read_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout { timeout: "read" });
        }

        let nyquist = self.acquisition.sample_rate_hz as f32 / 2.0;
        for (filter, frequency) in [
            ("high-pass", self.conditioning.highpass_cutoff_hz),
            ("notch", self.conditioning.notch_freq_hz),
        ] {
            if !(frequency > 0.0 && frequency < nyquist) {
                return Err(ConfigError::FilterFrequencyOutOfRange {
                    filter,
                    frequency,
                    nyquist,
                });
            }
        }
        if !(self.conditioning.notch_q > 0.0) {
            return Err(ConfigError::InvalidNotchQ(self.conditioning.notch_q));
        }

        let size = self.features.window_size;
        if size % 2 != 0 || !(spectral::FFT_SIZE..=capacity::WINDOW_CAPACITY).contains(&size) {
            return Err(ConfigError::WindowSizeOutOfRange {
                size,
                min: spectral::FFT_SIZE,
                max: capacity::WINDOW_CAPACITY,
            });
        }
        if !(self.features.zc_threshold >= 0.0 && self.features.zc_threshold.is_finite()) {
            return Err(ConfigError::InvalidZcThreshold(self.features.zc_threshold));
        }
        if let Some(scaling) = &self.features.scaling {
            let expected = self.feature_count();
            if scaling.len() != expected {
                return Err(ConfigError::ScalingTableLength {
                    got: scaling.len(),
                    expected,
                });
            }
        }

        if self.voting.confidence_threshold > 100 {
            return Err(ConfigError::ConfidenceThresholdOutOfRange(
                self.voting.confidence_threshold,
            ));
        }

        for (queue, depth) in [
            ("block", self.queues.block_queue_depth),
            ("feature", self.queues.feature_queue_depth),
            ("vote", self.queues.vote_queue_depth),
        ] {
            if depth == 0 {
                return Err(ConfigError::ZeroQueueDepth { queue });
            }
        }
        if self.queues.decide_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout { timeout: "decide" });
        }

        Ok(())
    }

    /// Number of channels the mask enables.
    pub fn enabled_channels(&self) -> usize {
        (self.acquisition.channel_mask & ((1u8 << capacity::CHANNELS) - 1)).count_ones() as usize
    }

    /// Length of the feature vector this configuration assembles,
    /// capped at the vector capacity.
    pub fn feature_count(&self) -> usize {
        let channels = self.enabled_channels();
        let spectra = if self.features.aggregate_spectrum {
            1
        } else {
            channels
        };
        (channels * capacity::TIME_DOMAIN_FEATURES + spectra * capacity::FREQUENCY_DOMAIN_FEATURES)
            .min(capacity::MAX_FEATURES)
    }

    /// One-line summary for startup logging.
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            sample_rate_hz: self.acquisition.sample_rate_hz,
            channels: self.enabled_channels(),
            window_size: self.features.window_size,
            feature_count: self.feature_count(),
            confidence_threshold: self.voting.confidence_threshold,
        }
    }
}

/// Configuration summary for display and logging.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    /// Sampling rate in Hz.
    pub sample_rate_hz: u32,
    /// Enabled channel count.
    pub channels: usize,
    /// Samples per analysis window.
    pub window_size: usize,
    /// Assembled feature vector length.
    pub feature_count: usize,
    /// Actuation gate threshold in percent.
    pub confidence_threshold: u8,
}

// src/processing/features/mod.rs
//! Feature assembly for the classifier.
//!
//! Each ready window turns into one [`FeatureVector`]: six time-domain
//! features per enabled channel, then eight frequency-domain features per
//! spectrum. The spectrum covers the trailing FFT frame of the window,
//! either once over the channel average or once per enabled channel.
//! Assembly stops silently at the vector capacity.

pub mod frequency;
pub mod time_domain;

use crate::config::constants::capacity::{CHANNELS, MAX_FEATURES};
use crate::config::constants::spectral::{FFT_SIZE, SPECTRUM_BINS};
use crate::config::{FeatureScale, PipelineConfig};
use crate::processing::spectral::{frequency_resolution, SpectrumAnalyzer};
use crate::processing::window::SlidingWindow;

pub use frequency::FrequencyDomainFeatures;
pub use time_domain::TimeDomainFeatures;

/// Fixed-capacity feature vector handed to the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f32; MAX_FEATURES],
    len: usize,
    /// Timestamp of the block that completed the window, in nanoseconds.
    pub timestamp: u64,
}

impl FeatureVector {
    /// Creates an empty vector stamped with the window timestamp.
    pub fn new(timestamp: u64) -> Self {
        Self {
            values: [0.0; MAX_FEATURES],
            len: 0,
            timestamp,
        }
    }

    /// Appends one feature. Returns false once the vector is full.
    pub fn push(&mut self, value: f32) -> bool {
        if self.len == MAX_FEATURES {
            return false;
        }
        self.values[self.len] = value;
        self.len += 1;
        true
    }

    /// Assembled features in assembly order.
    pub fn values(&self) -> &[f32] {
        &self.values[..self.len]
    }

    /// Number of assembled features.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no feature has been assembled yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Turns ready windows into feature vectors.
pub struct FeatureExtractor {
    analyzer: SpectrumAnalyzer,
    resolution_hz: f32,
    channel_mask: u8,
    aggregate_spectrum: bool,
    zc_threshold: f32,
    scaling: Option<Vec<FeatureScale>>,
    channel_scratch: Vec<f32>,
    frame_scratch: [f32; FFT_SIZE],
    spectrum_scratch: [f32; SPECTRUM_BINS],
}

impl FeatureExtractor {
    /// Builds an extractor for a validated configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(),
            resolution_hz: frequency_resolution(config.acquisition.sample_rate_hz),
            channel_mask: config.acquisition.channel_mask,
            aggregate_spectrum: config.features.aggregate_spectrum,
            zc_threshold: config.features.zc_threshold,
            scaling: config.features.scaling.clone(),
            channel_scratch: Vec::with_capacity(config.features.window_size),
            frame_scratch: [0.0; FFT_SIZE],
            spectrum_scratch: [0.0; SPECTRUM_BINS],
        }
    }

    /// Assembles the feature vector of a ready window.
    pub fn extract(&mut self, window: &SlidingWindow, timestamp: u64) -> FeatureVector {
        let frames = window.frames();
        let mut vector = FeatureVector::new(timestamp);

        for ch in 0..CHANNELS {
            if self.channel_mask & (1 << ch) == 0 {
                continue;
            }
            self.channel_scratch.clear();
            self.channel_scratch.extend(frames.iter().map(|frame| frame[ch]));
            let td = time_domain::extract(&self.channel_scratch, self.zc_threshold);
            for value in [
                td.rms,
                td.mav,
                td.variance,
                td.zero_crossings as f32,
                td.slope_sign_changes as f32,
                td.waveform_length,
            ] {
                vector.push(value);
            }
        }

        if self.aggregate_spectrum {
            self.load_average_frame(frames);
            self.push_spectrum(&mut vector);
        } else {
            for ch in 0..CHANNELS {
                if self.channel_mask & (1 << ch) == 0 {
                    continue;
                }
                self.load_channel_frame(frames, ch);
                self.push_spectrum(&mut vector);
            }
        }

        if let Some(scaling) = &self.scaling {
            for (value, entry) in vector.values[..vector.len].iter_mut().zip(scaling) {
                *value = (*value - entry.offset) * entry.scale;
            }
        }

        vector
    }

    /// Discards per-window scratch state.
    pub fn reset(&mut self) {
        self.channel_scratch.clear();
    }

    fn load_channel_frame(&mut self, frames: &[[f32; CHANNELS]], channel: usize) {
        self.frame_scratch.fill(0.0);
        let start = frames.len().saturating_sub(FFT_SIZE);
        for (dst, frame) in self.frame_scratch.iter_mut().zip(frames[start..].iter()) {
            *dst = frame[channel];
        }
    }

    fn load_average_frame(&mut self, frames: &[[f32; CHANNELS]]) {
        self.frame_scratch.fill(0.0);
        let enabled = self.channel_mask.count_ones().max(1) as f32;
        let start = frames.len().saturating_sub(FFT_SIZE);
        for (dst, frame) in self.frame_scratch.iter_mut().zip(frames[start..].iter()) {
            let mut sum = 0.0;
            for ch in 0..CHANNELS {
                if self.channel_mask & (1 << ch) != 0 {
                    sum += frame[ch];
                }
            }
            *dst = sum / enabled;
        }
    }

    fn push_spectrum(&mut self, vector: &mut FeatureVector) {
        self.analyzer
            .magnitude_spectrum(&self.frame_scratch, &mut self.spectrum_scratch);
        let fd = frequency::extract(&self.spectrum_scratch, self.resolution_hz);
        for value in [fd.mean_power_freq, fd.median_freq, fd.peak_freq, fd.total_power] {
            vector.push(value);
        }
        for value in fd.band_powers {
            vector.push(value);
        }
    }
}

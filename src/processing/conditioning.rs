// src/processing/conditioning.rs
//! Per-channel signal conditioning ahead of feature extraction.
//!
//! Each enabled channel runs, in order: conversion from raw converter codes
//! to volts, block-local mean removal, a second-order Butterworth high-pass
//! against motion artifacts, and a mains notch. Filter state carries across
//! blocks so the response stays continuous over block boundaries.

use crate::acquisition::SampleBlock;
use crate::config::constants::capacity::{BLOCK_CAPACITY, CHANNELS};
use crate::config::PipelineConfig;
use crate::utils::conversion::counts_to_volts;

const BUTTERWORTH_Q: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Normalized biquad coefficients (RBJ cookbook, `a0` divided out).
#[derive(Debug, Clone, Copy)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    fn highpass(cutoff_hz: f32, q: f32, sample_rate_hz: f32) -> Self {
        let omega = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate_hz;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let norm = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_omega) / 2.0 / norm,
            b1: -(1.0 + cos_omega) / norm,
            b2: (1.0 + cos_omega) / 2.0 / norm,
            a1: -2.0 * cos_omega / norm,
            a2: (1.0 - alpha) / norm,
        }
    }

    fn notch(centre_hz: f32, q: f32, sample_rate_hz: f32) -> Self {
        let omega = 2.0 * std::f32::consts::PI * centre_hz / sample_rate_hz;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let norm = 1.0 + alpha;
        Self {
            b0: 1.0 / norm,
            b1: -2.0 * cos_omega / norm,
            b2: 1.0 / norm,
            a1: -2.0 * cos_omega / norm,
            a2: (1.0 - alpha) / norm,
        }
    }

    fn bandpass(low_hz: f32, high_hz: f32, sample_rate_hz: f32) -> Self {
        // Geometric centre with Q set by the band edges, unity peak gain.
        let centre_hz = (low_hz * high_hz).sqrt();
        let q = centre_hz / (high_hz - low_hz);
        let omega = 2.0 * std::f32::consts::PI * centre_hz / sample_rate_hz;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);
        let norm = 1.0 + alpha;
        Self {
            b0: alpha / norm,
            b1: 0.0,
            b2: -alpha / norm,
            a1: -2.0 * cos_omega / norm,
            a2: (1.0 - alpha) / norm,
        }
    }

    /// Transposed direct form II step; two states per channel.
    fn process_df2t(&self, state: &mut Df2tState, x: f32) -> f32 {
        let y = self.b0 * x + state.z1;
        state.z1 = self.b1 * x - self.a1 * y + state.z2;
        state.z2 = self.b2 * x - self.a2 * y;
        y
    }

    /// Direct form I step; four states per channel.
    fn process_df1(&self, state: &mut Df1State, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * state.x1 + self.b2 * state.x2
            - self.a1 * state.y1
            - self.a2 * state.y2;
        state.x2 = state.x1;
        state.x1 = x;
        state.y2 = state.y1;
        state.y1 = y;
        y
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Df2tState {
    z1: f32,
    z2: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Df1State {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

/// Stateful conditioner for the acquisition-to-window path.
pub struct SignalConditioner {
    gain: u8,
    channel_mask: u8,
    highpass: BiquadCoeffs,
    notch: BiquadCoeffs,
    highpass_states: [Df2tState; CHANNELS],
    notch_states: [Df1State; CHANNELS],
}

impl SignalConditioner {
    /// Derives filter coefficients from a validated configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        let sample_rate = config.acquisition.sample_rate_hz as f32;
        Self {
            gain: config.acquisition.gain,
            channel_mask: config.acquisition.channel_mask,
            highpass: BiquadCoeffs::highpass(
                config.conditioning.highpass_cutoff_hz,
                BUTTERWORTH_Q,
                sample_rate,
            ),
            notch: BiquadCoeffs::notch(
                config.conditioning.notch_freq_hz,
                config.conditioning.notch_q,
                sample_rate,
            ),
            highpass_states: [Df2tState::default(); CHANNELS],
            notch_states: [Df1State::default(); CHANNELS],
        }
    }

    /// Whether a channel is enabled by the configured mask.
    pub fn channel_enabled(&self, channel: usize) -> bool {
        self.channel_mask & (1 << channel) != 0
    }

    /// Conditions one block into `out`, returning the frame count written.
    ///
    /// Disabled channels are zeroed so downstream indexing stays uniform.
    pub fn process_block(
        &mut self,
        block: &SampleBlock,
        out: &mut [[f32; CHANNELS]; BLOCK_CAPACITY],
    ) -> usize {
        let frames = block.frames();
        let n = frames.len();
        for ch in 0..CHANNELS {
            if !self.channel_enabled(ch) {
                for row in out.iter_mut().take(n) {
                    row[ch] = 0.0;
                }
                continue;
            }
            // Accumulated in f64 so a constant block centres to exactly zero.
            let mut sum = 0.0f64;
            for (row, frame) in out.iter_mut().zip(frames) {
                let volts = counts_to_volts(frame[ch], self.gain);
                row[ch] = volts;
                sum += volts as f64;
            }
            let mean = if n > 0 { (sum / n as f64) as f32 } else { 0.0 };
            for row in out.iter_mut().take(n) {
                let centred = row[ch] - mean;
                let highpassed = self
                    .highpass
                    .process_df2t(&mut self.highpass_states[ch], centred);
                row[ch] = self.notch.process_df1(&mut self.notch_states[ch], highpassed);
            }
        }
        n
    }

    /// Clears all filter state, as after a pipeline reset.
    pub fn reset(&mut self) {
        self.highpass_states = [Df2tState::default(); CHANNELS];
        self.notch_states = [Df1State::default(); CHANNELS];
    }
}

/// One-shot band isolation for exploratory analysis.
///
/// Runs a fresh unity-peak band-pass over `data` in place, oldest sample
/// first. State does not persist between calls, so this is unsuitable for
/// streaming use; the stateful conditioner covers that path.
pub fn bandpass_filter(data: &mut [f32], low_hz: f32, high_hz: f32, sample_rate_hz: f32) {
    let coeffs = BiquadCoeffs::bandpass(low_hz, high_hz, sample_rate_hz);
    let mut state = Df1State::default();
    for sample in data.iter_mut() {
        *sample = coeffs.process_df1(&mut state, *sample);
    }
}

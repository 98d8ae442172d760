// src/acquisition/source.rs
//! Signal source boundary and the built-in synthetic front-end.
//!
//! The pipeline never talks to hardware directly. Anything that can deliver
//! raw multichannel frames, a serial bridge to the amplifier board, a file
//! replayer, or the synthetic generator below, plugs in through
//! [`SignalSource`].

use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::constants::capacity::CHANNELS;
use crate::utils::conversion::volts_to_counts;

/// Errors a signal source may surface while reading.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source lost its transport and cannot recover.
    #[error("signal source disconnected: {0}")]
    Disconnected(String),

    /// A single read failed; the source may still recover.
    #[error("signal source read failed: {0}")]
    ReadFailed(String),
}

/// Provider of raw multichannel frames for the acquisition side.
pub trait SignalSource: Send {
    /// Fills `out` with up to `out.len()` frames of raw converter codes and
    /// returns how many were written. Returning `Ok(0)` means no data is
    /// available yet; the caller retries after a short pause.
    fn read_frames(&mut self, out: &mut [[i32; CHANNELS]]) -> Result<usize, SourceError>;
}

/// Deterministic muscle-like signal generator.
///
/// Each gesture class maps to a pair of tones inside the usable sEMG band
/// with class-dependent per-channel weighting, plus uniform noise, so
/// different classes produce distinguishable feature vectors. Seeded
/// explicitly, two sources with the same seed and settings emit identical
/// frame streams.
pub struct SyntheticSource {
    rng: StdRng,
    sample_rate_hz: u32,
    gesture: u8,
    amplitude_volts: f32,
    noise_volts: f32,
    gain: u8,
    tick: u64,
    paced: bool,
    started: Option<Instant>,
}

impl SyntheticSource {
    /// Creates a generator at the given sampling rate with a fixed seed.
    pub fn new(sample_rate_hz: u32, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sample_rate_hz,
            gesture: 0,
            amplitude_volts: 2.0e-3,
            noise_volts: 1.0e-4,
            gain: 24,
            tick: 0,
            paced: false,
            started: None,
        }
    }

    /// Selects the gesture class whose signature is rendered.
    pub fn with_gesture(mut self, class: u8) -> Self {
        self.gesture = class;
        self
    }

    /// Sets the tone amplitude at the electrode, in volts.
    pub fn with_amplitude_volts(mut self, volts: f32) -> Self {
        self.amplitude_volts = volts;
        self
    }

    /// Sets the uniform noise amplitude at the electrode, in volts.
    pub fn with_noise_volts(mut self, volts: f32) -> Self {
        self.noise_volts = volts;
        self
    }

    /// Sets the PGA gain the generated codes are referred through.
    pub fn with_gain(mut self, gain: u8) -> Self {
        self.gain = gain;
        self
    }

    /// Paces reads to wall-clock sampling cadence. Unpaced sources deliver
    /// frames as fast as the pipeline asks, which tests and benchmarks use.
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Switches the rendered gesture class mid-stream.
    pub fn set_gesture(&mut self, class: u8) {
        self.gesture = class;
    }

    fn frame_at(&mut self, tick: u64) -> [i32; CHANNELS] {
        let class = self.gesture as f32;
        let t = tick as f32 / self.sample_rate_hz as f32;
        let low_hz = 60.0 + 2.0 * class;
        let high_hz = 110.0 + 3.0 * class;
        let mut frame = [0i32; CHANNELS];
        for (ch, code) in frame.iter_mut().enumerate() {
            // Class rotates which channels carry the strongest activation.
            let rank = (self.gesture as usize + ch) % CHANNELS;
            let weight = 0.3 + 0.7 * rank as f32 / (CHANNELS - 1) as f32;
            let tone = (2.0 * std::f32::consts::PI * low_hz * t).sin()
                + 0.5 * (2.0 * std::f32::consts::PI * high_hz * t).sin();
            let noise = self.rng.gen_range(-1.0..1.0) * self.noise_volts;
            let volts = weight * self.amplitude_volts * tone + noise;
            *code = volts_to_counts(volts, self.gain);
        }
        frame
    }
}

impl SignalSource for SyntheticSource {
    fn read_frames(&mut self, out: &mut [[i32; CHANNELS]]) -> Result<usize, SourceError> {
        for frame in out.iter_mut() {
            *frame = self.frame_at(self.tick);
            self.tick += 1;
        }
        if self.paced {
            let started = *self.started.get_or_insert_with(Instant::now);
            let due = started
                + Duration::from_nanos(self.tick * 1_000_000_000 / self.sample_rate_hz as u64);
            let now = Instant::now();
            if due > now {
                thread::sleep(due - now);
            }
        }
        Ok(out.len())
    }
}

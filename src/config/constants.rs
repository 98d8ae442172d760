// src/config/constants.rs
//! Compile-time capacities and signal constants shared across the pipeline.
//!
//! Capacities mirror the fixed-size buffers of the embedded deployment so a
//! model or configuration that fits here also fits on the target hardware.

/// Hard capacities of the fixed-size pipeline buffers.
pub mod capacity {
    /// Number of electrode channels carried through the pipeline.
    pub const CHANNELS: usize = 4;

    /// Maximum frames a single acquisition block can hold.
    pub const BLOCK_CAPACITY: usize = 256;

    /// Maximum samples per channel in the sliding analysis window.
    pub const WINDOW_CAPACITY: usize = 256;

    /// Maximum entries in an assembled feature vector.
    pub const MAX_FEATURES: usize = 30;

    /// Time-domain features computed per enabled channel.
    pub const TIME_DOMAIN_FEATURES: usize = 6;

    /// Frequency-domain features computed per spectrum.
    pub const FREQUENCY_DOMAIN_FEATURES: usize = 8;

    /// Maximum trees a forest model may carry.
    pub const MAX_TREES: usize = 15;

    /// Maximum nodes per decision tree.
    pub const MAX_NODES_PER_TREE: usize = 63;

    /// Maximum gesture classes a model may emit.
    pub const MAX_CLASSES: usize = 29;

    /// Depth of the temporal voting ring.
    pub const VOTE_DEPTH: usize = 3;
}

/// ADS1299 analog front-end characteristics.
pub mod adc {
    /// Reference voltage of the front-end in volts.
    pub const VREF_VOLTS: f32 = 4.5;

    /// Positive full-scale code of the 24-bit converter.
    pub const FULL_SCALE: i32 = (1 << 23) - 1;

    /// Programmable gain steps supported by the front-end PGA.
    pub const PGA_GAINS: [u8; 7] = [1, 2, 4, 6, 8, 12, 24];
}

/// Spectral analysis geometry.
pub mod spectral {
    /// Points in the short FFT taken over the trailing window segment.
    pub const FFT_SIZE: usize = 64;

    /// One-sided magnitude bins produced per spectrum.
    pub const SPECTRUM_BINS: usize = FFT_SIZE / 2;

    /// Band edges in Hz for the band-power features.
    pub const BAND_EDGES_HZ: [(f32, f32); 4] =
        [(0.0, 50.0), (50.0, 150.0), (150.0, 250.0), (250.0, 500.0)];
}

/// Default values applied when the configuration omits a setting.
pub mod defaults {
    /// Sampling rate of the acquisition front-end in Hz.
    pub const SAMPLE_RATE_HZ: u32 = 1000;

    /// Front-end PGA gain.
    pub const GAIN: u8 = 24;

    /// Frames accumulated before a block is published.
    pub const BLOCK_SIZE: usize = 64;

    /// All four channels enabled.
    pub const CHANNEL_MASK: u8 = 0x0F;

    /// Samples per analysis window.
    pub const WINDOW_SIZE: usize = 256;

    /// High-pass cutoff in Hz for motion-artifact removal.
    pub const HIGHPASS_CUTOFF_HZ: f32 = 20.0;

    /// Mains interference notch centre in Hz.
    pub const NOTCH_FREQ_HZ: f32 = 50.0;

    /// Quality factor of the mains notch.
    pub const NOTCH_Q: f32 = 10.0;

    /// Rectified amplitude below which a sign change is treated as noise.
    pub const ZC_THRESHOLD_VOLTS: f32 = 0.001;

    /// Smoothed confidence must exceed this percentage to actuate.
    pub const CONFIDENCE_THRESHOLD: u8 = 70;

    /// Acquisition wait on the exchange slot in milliseconds.
    pub const READ_TIMEOUT_MS: u64 = 10;

    /// Decision stage inbound wait in milliseconds.
    pub const DECIDE_TIMEOUT_MS: u64 = 20;

    /// Depth of the block queue between acquisition and conditioning.
    pub const BLOCK_QUEUE_DEPTH: usize = 4;

    /// Depth of the feature queue between conditioning and inference.
    pub const FEATURE_QUEUE_DEPTH: usize = 2;

    /// Depth of the vote queue between inference and decision.
    pub const VOTE_QUEUE_DEPTH: usize = 2;
}

// tests/feature_extraction_tests.rs
//! End-to-end checks of the conditioning and feature path: raw converter
//! codes in, assembled feature vectors out, without the pipeline threads.

use std::f32::consts::PI;

use gesture_core::acquisition::SampleBlock;
use gesture_core::processing::{FeatureExtractor, FeatureVector, SignalConditioner, SlidingWindow};
use gesture_core::utils::volts_to_counts;
use gesture_core::PipelineConfig;

const BLOCK_SIZE: usize = 64;

fn single_channel_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.acquisition.channel_mask = 0b0001;
    config
}

/// Runs `n_frames` of a channel-0 tone through the full chain, block by
/// block, collecting every completed feature vector.
fn run_chain(
    config: &PipelineConfig,
    n_frames: usize,
    tone_hz: f32,
    volts: f32,
) -> Vec<FeatureVector> {
    let sample_rate = config.acquisition.sample_rate_hz as f32;
    let gain = config.acquisition.gain;
    let mut conditioner = SignalConditioner::new(config);
    let mut window = SlidingWindow::new(config.features.window_size);
    let mut extractor = FeatureExtractor::new(config);
    let mut conditioned = [[0.0f32; 4]; 256];
    let mut vectors = Vec::new();

    let mut block = SampleBlock::new();
    let mut block_index = 0u64;
    for tick in 0..n_frames {
        let t = tick as f32 / sample_rate;
        let code = volts_to_counts(volts * (2.0 * PI * tone_hz * t).sin(), gain);
        block.push_frame([code, 0, 0, 0]);
        if block.len() == BLOCK_SIZE || tick + 1 == n_frames {
            block.timestamp = block_index;
            let frames = conditioner.process_block(&block, &mut conditioned);
            for frame in &conditioned[..frames] {
                if window.push(*frame) {
                    vectors.push(extractor.extract(&window, block.timestamp));
                    window.advance();
                }
            }
            block.clear();
            block_index += 1;
        }
    }
    vectors
}

#[test]
fn test_window_cadence_over_blocks() {
    // 256-sample window with 50% overlap over 1024 frames: 7 extractions.
    let config = single_channel_config();
    let vectors = run_chain(&config, 1024, 125.0, 0.001);
    assert_eq!(vectors.len(), 7);
}

#[test]
fn test_vectors_carry_completing_block_timestamp() {
    let config = single_channel_config();
    let vectors = run_chain(&config, 1024, 125.0, 0.001);
    // Window k completes at frame 255 + 128k, inside 64-frame block
    // (255 + 128k) / 64.
    let stamps: Vec<u64> = vectors.iter().map(|v| v.timestamp).collect();
    assert_eq!(stamps, vec![3, 5, 7, 9, 11, 13, 15]);
}

#[test]
fn test_tone_survives_conditioning_into_features() {
    let config = single_channel_config();
    let volts = 0.001;
    let vectors = run_chain(&config, 1024, 125.0, volts);
    // Skip the first vector: it carries the filter startup transient.
    let vector = &vectors[1];
    assert_eq!(vector.len(), config.feature_count());
    assert_eq!(vector.len(), 14);

    let values = vector.values();
    // 125 Hz sits well above the 20 Hz high-pass and away from the 50 Hz
    // notch, so the RMS should be close to the ideal sine RMS.
    let expected_rms = volts / 2.0f32.sqrt();
    assert!(
        (values[0] - expected_rms).abs() < 0.15 * expected_rms,
        "rms {} too far from {}",
        values[0],
        expected_rms
    );
    // Peak and median land exactly on the 125 Hz bin of the 64-point FFT.
    assert!((values[8] - 125.0).abs() < 1e-3, "peak {}", values[8]);
    assert!((values[7] - 125.0).abs() < 1e-3, "median {}", values[7]);
    // The 50-150 Hz band dominates the spectrum.
    let bands = &values[10..14];
    for (i, power) in bands.iter().enumerate() {
        if i != 1 {
            assert!(bands[1] > *power, "band 1 {} not above band {i} {power}", bands[1]);
        }
    }
}

#[test]
fn test_disabled_channel_contributes_zeros() {
    let mut config = PipelineConfig::default();
    // Tone is generated on channel 0, which the mask excludes.
    config.acquisition.channel_mask = 0b0010;
    let vectors = run_chain(&config, 1024, 125.0, 0.001);
    assert_eq!(vectors.len(), 7);
    let values = vectors[1].values();
    // Channel 1 carries no signal, so its time-domain block is all zero.
    for (i, value) in values[..6].iter().enumerate() {
        assert_eq!(*value, 0.0, "feature {i} should be zero");
    }
}

#[test]
fn test_full_mask_truncates_at_capacity() {
    // Four channels of time-domain features plus one aggregate spectrum
    // would be 32 values; the vector stops at its capacity of 30.
    let config = PipelineConfig::default();
    let vectors = run_chain(&config, 512, 125.0, 0.001);
    assert!(!vectors.is_empty());
    assert_eq!(vectors[0].len(), 30);
    assert_eq!(config.feature_count(), 30);
}

#[test]
fn test_reset_restarts_accumulation() {
    let config = single_channel_config();
    let mut window = SlidingWindow::new(config.features.window_size);
    for _ in 0..200 {
        window.push([0.0; 4]);
    }
    assert_eq!(window.len(), 200);
    window.reset();
    assert_eq!(window.len(), 0);
    // A fresh window needs the full size again.
    let mut completions = 0;
    for _ in 0..255 {
        if window.push([0.0; 4]) {
            completions += 1;
        }
    }
    assert_eq!(completions, 0);
    assert!(window.push([0.0; 4]));
}

// src/processing/features/time_domain.rs
//! Time-domain features over one channel of the analysis window.
//!
//! Six features per channel: RMS, mean absolute value, population variance,
//! zero crossings, slope sign changes and waveform length. The two counting
//! features are gated by a noise threshold so baseline jitter does not
//! register as activity.

/// Time-domain features of a single channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeDomainFeatures {
    /// Root mean square amplitude.
    pub rms: f32,
    /// Mean absolute value.
    pub mav: f32,
    /// Population variance.
    pub variance: f32,
    /// Sign changes whose endpoints both clear the noise threshold.
    pub zero_crossings: u32,
    /// Slope reversals whose slopes both clear the noise threshold.
    pub slope_sign_changes: u32,
    /// Cumulative absolute sample-to-sample difference.
    pub waveform_length: f32,
}

/// Computes all six features of one channel. Empty input yields zeros.
pub fn extract(samples: &[f32], threshold: f32) -> TimeDomainFeatures {
    TimeDomainFeatures {
        rms: rms(samples),
        mav: mean_absolute_value(samples),
        variance: variance(samples),
        zero_crossings: zero_crossings(samples, threshold),
        slope_sign_changes: slope_sign_changes(samples, threshold),
        waveform_length: waveform_length(samples),
    }
}

/// Root mean square amplitude.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Mean absolute value.
pub fn mean_absolute_value(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&x| x.abs()).sum::<f32>() / samples.len() as f32
}

/// Population variance (divides by `n`, not `n - 1`).
pub fn variance(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f32;
    let mean = samples.iter().sum::<f32>() / n;
    samples.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / n
}

/// Counts sign changes between consecutive samples where both samples
/// clear the noise threshold in magnitude.
pub fn zero_crossings(samples: &[f32], threshold: f32) -> u32 {
    let mut count = 0;
    for pair in samples.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if (current >= threshold && next <= -threshold)
            || (current <= -threshold && next >= threshold)
        {
            count += 1;
        }
    }
    count
}

/// Counts slope reversals across consecutive sample triples where both
/// slopes clear the noise threshold in magnitude.
pub fn slope_sign_changes(samples: &[f32], threshold: f32) -> u32 {
    if samples.len() < 3 {
        return 0;
    }
    let mut count = 0;
    for i in 1..samples.len() - 1 {
        let prev_slope = samples[i] - samples[i - 1];
        let next_slope = samples[i + 1] - samples[i];
        if (prev_slope > threshold && next_slope < -threshold)
            || (prev_slope < -threshold && next_slope > threshold)
        {
            count += 1;
        }
    }
    count
}

/// Sum of absolute sample-to-sample differences.
pub fn waveform_length(samples: &[f32]) -> f32 {
    samples
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .sum()
}

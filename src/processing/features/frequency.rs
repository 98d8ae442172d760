// src/processing/features/frequency.rs
//! Frequency-domain features over a magnitude spectrum.
//!
//! All features operate on the power spectrum, the squared magnitude of each
//! bin. Band edges are mapped to bins with a floor division by the frequency
//! resolution and each band covers a half-open bin range, so a bin sitting
//! just below an edge belongs to the band above it.

use crate::config::constants::spectral::BAND_EDGES_HZ;

/// Frequency-domain features of one magnitude spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyDomainFeatures {
    /// Power-weighted mean frequency in Hz.
    pub mean_power_freq: f32,
    /// Frequency splitting the spectrum into equal power halves, in Hz.
    pub median_freq: f32,
    /// Frequency of the strongest bin in Hz.
    pub peak_freq: f32,
    /// Sum of power over all bins.
    pub total_power: f32,
    /// Power inside each configured band.
    pub band_powers: [f32; BAND_EDGES_HZ.len()],
}

/// Computes all frequency-domain features of one spectrum.
///
/// `resolution_hz` is the bin spacing, sample rate divided by FFT size.
pub fn extract(spectrum: &[f32], resolution_hz: f32) -> FrequencyDomainFeatures {
    let mut band_powers = [0.0; BAND_EDGES_HZ.len()];
    for (power, &(low_hz, high_hz)) in band_powers.iter_mut().zip(BAND_EDGES_HZ.iter()) {
        *power = band_power(spectrum, resolution_hz, low_hz, high_hz);
    }
    FrequencyDomainFeatures {
        mean_power_freq: mean_power_frequency(spectrum, resolution_hz),
        median_freq: median_frequency(spectrum, resolution_hz),
        peak_freq: peak_frequency(spectrum, resolution_hz),
        total_power: total_power(spectrum),
        band_powers,
    }
}

fn bin_power(magnitude: f32) -> f32 {
    magnitude * magnitude
}

/// Power-weighted mean frequency. Zero for an empty spectrum.
pub fn mean_power_frequency(spectrum: &[f32], resolution_hz: f32) -> f32 {
    let total: f32 = spectrum.iter().map(|&m| bin_power(m)).sum();
    if total == 0.0 {
        return 0.0;
    }
    let weighted: f32 = spectrum
        .iter()
        .enumerate()
        .map(|(i, &m)| i as f32 * resolution_hz * bin_power(m))
        .sum();
    weighted / total
}

/// Frequency of the first bin where cumulative power reaches half the total.
pub fn median_frequency(spectrum: &[f32], resolution_hz: f32) -> f32 {
    let total: f32 = spectrum.iter().map(|&m| bin_power(m)).sum();
    if total == 0.0 {
        return 0.0;
    }
    let half = total / 2.0;
    let mut cumulative = 0.0;
    for (i, &m) in spectrum.iter().enumerate() {
        cumulative += bin_power(m);
        if cumulative >= half {
            return i as f32 * resolution_hz;
        }
    }
    (spectrum.len().saturating_sub(1)) as f32 * resolution_hz
}

/// Frequency of the strongest bin. Ties resolve to the lowest bin.
pub fn peak_frequency(spectrum: &[f32], resolution_hz: f32) -> f32 {
    let mut peak_bin = 0;
    let mut peak_power = 0.0;
    for (i, &m) in spectrum.iter().enumerate() {
        let power = bin_power(m);
        if power > peak_power {
            peak_power = power;
            peak_bin = i;
        }
    }
    peak_bin as f32 * resolution_hz
}

/// Sum of power over every bin.
pub fn total_power(spectrum: &[f32]) -> f32 {
    spectrum.iter().map(|&m| bin_power(m)).sum()
}

/// Power inside `[low_hz, high_hz)` after floor-mapping both edges to bins.
pub fn band_power(spectrum: &[f32], resolution_hz: f32, low_hz: f32, high_hz: f32) -> f32 {
    if resolution_hz <= 0.0 {
        return 0.0;
    }
    let low_bin = (low_hz / resolution_hz) as usize;
    let high_bin = ((high_hz / resolution_hz) as usize).min(spectrum.len());
    if low_bin >= high_bin {
        return 0.0;
    }
    spectrum[low_bin..high_bin].iter().map(|&m| bin_power(m)).sum()
}

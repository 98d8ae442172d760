// src/processing/spectral.rs
//! Short-FFT magnitude spectrum over the trailing window segment.
//!
//! The embedded target cannot afford a full-window transform, so spectral
//! features come from a 64-point FFT of the newest samples, Hamming tapered
//! to tame leakage. Magnitudes are one-sided: 32 bins from DC up to just
//! below Nyquist.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::constants::spectral::{FFT_SIZE, SPECTRUM_BINS};

/// Reusable FFT plan plus scratch storage for magnitude spectra.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    taper: [f32; FFT_SIZE],
}

impl SpectrumAnalyzer {
    /// Plans the forward FFT and precomputes the Hamming taper.
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            scratch,
            taper: hamming(),
        }
    }

    /// Computes the one-sided magnitude spectrum of a 64-sample frame.
    pub fn magnitude_spectrum(&mut self, frame: &[f32; FFT_SIZE], out: &mut [f32; SPECTRUM_BINS]) {
        for (slot, (&sample, &weight)) in
            self.buffer.iter_mut().zip(frame.iter().zip(self.taper.iter()))
        {
            *slot = Complex::new(sample * weight, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        for (bin, magnitude) in out.iter_mut().enumerate() {
            *magnitude = self.buffer[bin].norm();
        }
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Width of one spectrum bin in Hz at the given sampling rate.
pub fn frequency_resolution(sample_rate_hz: u32) -> f32 {
    sample_rate_hz as f32 / FFT_SIZE as f32
}

fn hamming() -> [f32; FFT_SIZE] {
    let mut taper = [0.0f32; FFT_SIZE];
    for (i, weight) in taper.iter_mut().enumerate() {
        *weight = 0.54
            - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / (FFT_SIZE - 1) as f32).cos();
    }
    taper
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_shape() {
        let taper = hamming();
        assert!((taper[0] - 0.08).abs() < 1e-6);
        assert!((taper[FFT_SIZE - 1] - 0.08).abs() < 1e-6);
        // Near-unity in the middle, symmetric about it.
        assert!(taper[FFT_SIZE / 2 - 1] > 0.99);
        for i in 0..FFT_SIZE / 2 {
            assert!((taper[i] - taper[FFT_SIZE - 1 - i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_dc_concentrates_in_bin_zero() {
        let mut analyzer = SpectrumAnalyzer::new();
        let frame = [1.0f32; FFT_SIZE];
        let mut spectrum = [0.0f32; SPECTRUM_BINS];
        analyzer.magnitude_spectrum(&frame, &mut spectrum);
        // Bin 0 carries the taper sum; everything past the first sidelobes
        // stays far below it.
        let taper_sum: f32 = hamming().iter().sum();
        assert!((spectrum[0] - taper_sum).abs() < 1e-3);
        for &magnitude in &spectrum[3..] {
            assert!(magnitude < taper_sum * 0.01);
        }
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let mut analyzer = SpectrumAnalyzer::new();
        // Eight cycles over 64 samples sit exactly in bin 8.
        let mut frame = [0.0f32; FFT_SIZE];
        for (i, sample) in frame.iter_mut().enumerate() {
            *sample = (2.0 * std::f32::consts::PI * 8.0 * i as f32 / FFT_SIZE as f32).sin();
        }
        let mut spectrum = [0.0f32; SPECTRUM_BINS];
        analyzer.magnitude_spectrum(&frame, &mut spectrum);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(bin, _)| bin)
            .unwrap();
        assert_eq!(peak, 8);
    }

    #[test]
    fn test_resolution() {
        assert_eq!(frequency_resolution(1000), 15.625);
        assert_eq!(frequency_resolution(2000), 31.25);
    }
}

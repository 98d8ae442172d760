//! ADS1299 code-to-voltage conversion.
//!
//! The front-end delivers signed 24-bit codes. The transfer function maps a
//! code to electrode volts through the reference voltage and the PGA gain:
//! `volts = raw * VREF / (gain * (2^23 - 1))`.

use crate::config::constants::adc;

/// Converts a signed 24-bit converter code to electrode volts.
///
/// Codes outside the 24-bit range are not rejected: they scale linearly past
/// full scale, which keeps the conversion branch-free on the hot path. The
/// gain must be one of [`adc::PGA_GAINS`]; the configuration layer enforces
/// this before a conditioner is built.
pub fn counts_to_volts(raw: i32, gain: u8) -> f32 {
    raw as f32 * adc::VREF_VOLTS / (gain as f32 * adc::FULL_SCALE as f32)
}

/// Inverse of [`counts_to_volts`], rounding to the nearest code.
///
/// Used by the synthetic signal source and by tests that construct raw blocks
/// from known waveforms.
pub fn volts_to_counts(volts: f32, gain: u8) -> i32 {
    let code = volts * gain as f32 * adc::FULL_SCALE as f32 / adc::VREF_VOLTS;
    code.round()
        .clamp(-(adc::FULL_SCALE as f32) - 1.0, adc::FULL_SCALE as f32) as i32
}

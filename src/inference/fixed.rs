// src/inference/fixed.rs
//! Q8.8 fixed-point arithmetic for classifier evaluation.
//!
//! Thresholds and normalized features travel through the forest as signed
//! 16-bit values with 8 fractional bits, matching the representation the
//! model exporter emits. All operations saturate instead of wrapping, and
//! multiplication and division widen to 32 bits internally and round to the
//! nearest representable value.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Signed fixed-point number with 8 integer and 8 fractional bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i16);

impl Fixed {
    /// Fractional bits in the representation.
    pub const FRACTIONAL_BITS: u32 = 8;

    /// Value of 1.0 in raw units.
    pub const SCALE: i32 = 1 << Self::FRACTIONAL_BITS;

    /// Zero.
    pub const ZERO: Fixed = Fixed(0);

    /// One.
    pub const ONE: Fixed = Fixed(Self::SCALE as i16);

    /// Largest representable value, just under 128.
    pub const MAX: Fixed = Fixed(i16::MAX);

    /// Smallest representable value, -128.
    pub const MIN: Fixed = Fixed(i16::MIN);

    /// Wraps a raw Q8.8 bit pattern.
    pub const fn from_raw(raw: i16) -> Self {
        Fixed(raw)
    }

    /// Raw Q8.8 bit pattern.
    pub const fn raw(self) -> i16 {
        self.0
    }

    /// Converts from `f32`, rounding to the nearest representable value and
    /// saturating at the range limits. NaN converts to zero.
    pub fn from_f32(value: f32) -> Self {
        Fixed((value * Self::SCALE as f32).round() as i16)
    }

    /// Converts to `f32`. Exact: every Q8.8 value fits in an `f32` mantissa.
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / Self::SCALE as f32
    }

    /// Addition clamped to the representable range.
    pub fn saturating_add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }

    /// Subtraction clamped to the representable range.
    pub fn saturating_sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }

    /// Product rounded to the nearest Q8.8 value, saturating on overflow.
    pub fn saturating_mul(self, rhs: Fixed) -> Fixed {
        // i16 * i16 fits in i32 with room for the rounding bias.
        let wide = self.0 as i32 * rhs.0 as i32;
        Fixed(round_q8(wide))
    }

    /// Quotient rounded to the nearest Q8.8 value, saturating on overflow.
    ///
    /// Division by zero yields the maximum magnitude carrying the dividend's
    /// sign; a zero dividend over zero yields [`Fixed::MAX`].
    pub fn saturating_div(self, rhs: Fixed) -> Fixed {
        if rhs.0 == 0 {
            return if self.0 < 0 { Fixed::MIN } else { Fixed::MAX };
        }
        let num = (self.0 as i32) << Self::FRACTIONAL_BITS;
        let den = rhs.0 as i32;
        let mut quot = num / den;
        let rem = num % den;
        if 2 * rem.abs() >= den.abs() {
            quot += if (num < 0) == (den < 0) { 1 } else { -1 };
        }
        Fixed(clamp_i16(quot))
    }

    /// Absolute value, saturating for [`Fixed::MIN`].
    pub fn abs(self) -> Fixed {
        Fixed(self.0.checked_abs().unwrap_or(i16::MAX))
    }
}

/// Divides a widened product by the scale, rounding half away from zero.
fn round_q8(wide: i32) -> i16 {
    let half = Fixed::SCALE / 2;
    let rounded = if wide >= 0 {
        (wide + half) >> Fixed::FRACTIONAL_BITS
    } else {
        -((-wide + half) >> Fixed::FRACTIONAL_BITS)
    };
    clamp_i16(rounded)
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        self.saturating_add(rhs)
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        self.saturating_sub(rhs)
    }
}

impl Mul for Fixed {
    type Output = Fixed;

    fn mul(self, rhs: Fixed) -> Fixed {
        self.saturating_mul(rhs)
    }
}

impl Div for Fixed {
    type Output = Fixed;

    fn div(self, rhs: Fixed) -> Fixed {
        self.saturating_div(rhs)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_constants() {
        assert_eq!(Fixed::ONE.raw(), 256);
        assert_eq!(Fixed::ONE.to_f32(), 1.0);
        assert_eq!(Fixed::ZERO.to_f32(), 0.0);
        assert!((Fixed::MAX.to_f32() - 127.996).abs() < 0.001);
        assert_eq!(Fixed::MIN.to_f32(), -128.0);
    }

    #[test]
    fn test_from_f32_rounds_to_nearest() {
        assert_eq!(Fixed::from_f32(1.0).raw(), 256);
        assert_eq!(Fixed::from_f32(0.5).raw(), 128);
        // Half a step rounds away from zero.
        assert_eq!(Fixed::from_f32(1.0 / 512.0).raw(), 1);
        assert_eq!(Fixed::from_f32(-1.0 / 512.0).raw(), -1);
        // Just under half a step rounds toward zero.
        assert_eq!(Fixed::from_f32(0.9 / 512.0).raw(), 0);
    }

    #[test]
    fn test_from_f32_saturates() {
        assert_eq!(Fixed::from_f32(500.0), Fixed::MAX);
        assert_eq!(Fixed::from_f32(-500.0), Fixed::MIN);
        assert_eq!(Fixed::from_f32(f32::NAN), Fixed::ZERO);
    }

    #[test]
    fn test_add_saturates() {
        assert_eq!(Fixed::MAX + Fixed::ONE, Fixed::MAX);
        assert_eq!(Fixed::MIN - Fixed::ONE, Fixed::MIN);
        assert_eq!(Fixed::from_f32(2.0) + Fixed::from_f32(3.0), Fixed::from_f32(5.0));
    }

    #[test]
    fn test_mul_known_values() {
        assert_eq!(Fixed::from_f32(2.0) * Fixed::from_f32(3.5), Fixed::from_f32(7.0));
        assert_eq!(Fixed::from_f32(-2.0) * Fixed::from_f32(3.5), Fixed::from_f32(-7.0));
        assert_eq!(Fixed::from_f32(0.5) * Fixed::from_f32(0.5), Fixed::from_f32(0.25));
        // Overflowing products clamp.
        assert_eq!(Fixed::from_f32(100.0) * Fixed::from_f32(100.0), Fixed::MAX);
        assert_eq!(Fixed::from_f32(-100.0) * Fixed::from_f32(100.0), Fixed::MIN);
    }

    #[test]
    fn test_div_by_zero_keeps_dividend_sign() {
        assert_eq!(Fixed::from_f32(3.0) / Fixed::ZERO, Fixed::MAX);
        assert_eq!(Fixed::from_f32(-3.0) / Fixed::ZERO, Fixed::MIN);
        assert_eq!(Fixed::ZERO / Fixed::ZERO, Fixed::MAX);
    }

    #[test]
    fn test_div_known_values() {
        assert_eq!(Fixed::from_f32(7.0) / Fixed::from_f32(2.0), Fixed::from_f32(3.5));
        assert_eq!(Fixed::from_f32(-7.0) / Fixed::from_f32(2.0), Fixed::from_f32(-3.5));
        assert_eq!(Fixed::from_f32(1.0) / Fixed::from_f32(64.0), Fixed::from_raw(4));
        // An out-of-range divisor clamps to MAX before dividing.
        assert_eq!(Fixed::from_f32(1.0) / Fixed::from_f32(256.0), Fixed::from_raw(2));
    }

    #[test]
    fn test_abs() {
        assert_eq!(Fixed::from_f32(-3.0).abs(), Fixed::from_f32(3.0));
        assert_eq!(Fixed::MIN.abs(), Fixed::MAX);
    }

    proptest! {
        #[test]
        fn prop_f32_round_trip_is_identity(raw in any::<i16>()) {
            let x = Fixed::from_raw(raw);
            prop_assert_eq!(Fixed::from_f32(x.to_f32()), x);
        }

        #[test]
        fn prop_add_matches_float_when_in_range(a in -8000i16..=8000, b in -8000i16..=8000) {
            let sum = Fixed::from_raw(a) + Fixed::from_raw(b);
            let expected = (a as f32 + b as f32) / Fixed::SCALE as f32;
            prop_assert!((sum.to_f32() - expected).abs() < 1e-3);
        }

        #[test]
        fn prop_mul_error_bounded(a in -2800i16..=2800, b in -2800i16..=2800) {
            let product = Fixed::from_raw(a) * Fixed::from_raw(b);
            let expected = Fixed::from_raw(a).to_f32() as f64 * Fixed::from_raw(b).to_f32() as f64;
            // Exact product rounds to nearest step, so error is at most half a step.
            prop_assert!((product.to_f32() as f64 - expected).abs() <= 1.0 / 512.0 + 1e-6);
        }

        #[test]
        fn prop_div_error_bounded(a in -8000i16..=8000, b in 64i16..=16000) {
            // |a| <= 8000 and |b| >= 64 keep the true quotient representable.
            let quotient = Fixed::from_raw(a) / Fixed::from_raw(b);
            let expected = a as f64 / b as f64;
            prop_assert!((quotient.to_f32() as f64 - expected).abs() <= 1.0 / 512.0 + 1e-6);
        }

        #[test]
        fn prop_ordering_matches_float(a in any::<i16>(), b in any::<i16>()) {
            let (x, y) = (Fixed::from_raw(a), Fixed::from_raw(b));
            prop_assert_eq!(x < y, x.to_f32() < y.to_f32());
        }
    }
}

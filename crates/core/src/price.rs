//! Fixed-point price representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Fixed-point number with 8 decimal places.
/// Used for price representation without floating-point drift in comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixedPoint(pub u64);

impl FixedPoint {
    /// Number of decimal places.
    pub const DECIMALS: u32 = 8;
    /// Scale factor: 10^8
    pub const SCALE: u64 = 100_000_000;

    pub const ZERO: FixedPoint = FixedPoint(0);

    /// Create from f64. Negative and NaN inputs clamp to zero.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::ZERO;
        }
        Self((value * Self::SCALE as f64).round() as u64)
    }

    /// Convert to f64 (for display and JSON output).
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Premium in basis points: (sell - buy) / buy * 10000
    pub fn premium_bps(buy: FixedPoint, sell: FixedPoint) -> i32 {
        if buy.0 == 0 {
            return 0;
        }
        let diff = sell.0 as i128 - buy.0 as i128;
        ((diff * 10000) / buy.0 as i128).clamp(i32::MIN as i128, i32::MAX as i128) as i32
    }

    /// Shift this price by a signed number of basis points.
    pub fn shifted_bps(self, bps: i32) -> Self {
        let shifted = self.0 as i128 + (self.0 as i128 * bps as i128) / 10000;
        Self(shifted.max(0) as u64)
    }
}

impl Add for FixedPoint {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for FixedPoint {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:08}",
            self.0 / Self::SCALE,
            self.0 % Self::SCALE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixed_point_conversion() {
        let one = FixedPoint::from_f64(1.0);
        assert_eq!(one.0, 100_000_000u64);

        let price = FixedPoint::from_f64(2450.5);
        assert_eq!(price.to_f64(), 2450.5);
    }

    #[test]
    fn test_fixed_point_rejects_negative() {
        assert_eq!(FixedPoint::from_f64(-3.0), FixedPoint::ZERO);
        assert_eq!(FixedPoint::from_f64(f64::NAN), FixedPoint::ZERO);
    }

    #[test]
    fn test_fixed_point_arithmetic() {
        let a = FixedPoint::from_f64(100.0);
        let b = FixedPoint::from_f64(50.0);

        assert_eq!((a + b).to_f64(), 150.0);
        assert_eq!((a - b).to_f64(), 50.0);
        // Saturates instead of wrapping
        assert_eq!(b - a, FixedPoint::ZERO);
    }

    #[test]
    fn test_premium_bps() {
        let buy = FixedPoint::from_f64(100.0);
        let sell = FixedPoint::from_f64(101.0);
        assert_eq!(FixedPoint::premium_bps(buy, sell), 100);
        assert_eq!(FixedPoint::premium_bps(sell, buy), -99);
        assert_eq!(FixedPoint::premium_bps(FixedPoint::ZERO, sell), 0);
    }

    #[test]
    fn test_premium_bps_saturates_on_extreme_ratio() {
        let dust = FixedPoint(1);
        let huge = FixedPoint(u64::MAX);
        assert_eq!(FixedPoint::premium_bps(dust, huge), i32::MAX);
        assert_eq!(FixedPoint::premium_bps(huge, dust), -9999);
    }

    #[test]
    fn test_shifted_bps() {
        let base = FixedPoint::from_f64(200.0);
        assert_eq!(base.shifted_bps(50).to_f64(), 201.0);
        assert_eq!(base.shifted_bps(-50).to_f64(), 199.0);
        assert_eq!(base.shifted_bps(-20_000), FixedPoint::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(FixedPoint::from_f64(1.5).to_string(), "1.50000000");
    }
}

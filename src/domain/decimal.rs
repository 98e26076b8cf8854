//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Carries every USD value and token amount in the system. Provides raw
//! on-chain integer scaling, canonical string formatting without exponent
//! notation, and a zero-guarded division for percentage derivation.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless decimal numeric type for financial calculations.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to JSON number (not string) by default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Scale a raw on-chain integer amount (smallest unit) into human units.
    ///
    /// `from_raw(12_345_678, 7)` is `1.2345678`.
    pub fn from_raw(raw: i64, decimals: u32) -> Self {
        Decimal(RustDecimal::new(raw, decimals))
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation,
    /// no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// The multiplicative identity (1).
    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// The larger of self and other.
    pub fn max(self, other: Decimal) -> Self {
        if self >= other {
            self
        } else {
            other
        }
    }

    /// Divide, returning `None` when the divisor is zero.
    ///
    /// Every percentage in the system is derived through this guard so a
    /// zero cost basis can never surface as NaN or infinity downstream.
    pub fn checked_div(self, rhs: Decimal) -> Option<Decimal> {
        if rhs.is_zero() {
            None
        } else {
            Some(Decimal(self.0 / rhs.0))
        }
    }

    /// `self / base * 100`, or `None` when `base` is zero.
    pub fn pct_of(self, base: Decimal) -> Option<Decimal> {
        self.checked_div(base)
            .map(|ratio| Decimal(ratio.0 * RustDecimal::ONE_HUNDRED))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_from_raw_scales_by_decimals() {
        assert_eq!(Decimal::from_raw(12_345_678, 7), d("1.2345678"));
        assert_eq!(Decimal::from_raw(10_000_000, 7), d("1"));
        assert_eq!(Decimal::from_raw(5, 0), d("5"));
        assert_eq!(Decimal::from_raw(-25_000_000, 7), d("-2.5"));
    }

    #[test]
    fn test_canonical_string_no_exponent_no_trailing_zeros() {
        assert_eq!(Decimal::from_raw(10_000_000, 7).to_canonical_string(), "1");
        let formatted = d("123.4500").to_canonical_string();
        assert!(!formatted.contains('e'));
        assert_eq!(formatted, "123.45");
    }

    #[test]
    fn test_parse_roundtrip() {
        for s in ["123.456", "0.0001", "1000000", "-123.456", "0"] {
            let parsed = d(s);
            let reparsed = d(&parsed.to_canonical_string());
            assert_eq!(parsed, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_arithmetic() {
        let a = d("10.5");
        let b = d("2.5");
        assert_eq!(a + b, d("13"));
        assert_eq!(a - b, d("8"));
        assert_eq!(a * b, d("26.25"));
        assert_eq!(-a, d("-10.5"));

        let mut acc = Decimal::zero();
        acc += d("1.25");
        acc += d("2.75");
        assert_eq!(acc, d("4"));
        acc -= d("1");
        assert_eq!(acc, d("3"));
    }

    #[test]
    fn test_checked_div_guards_zero() {
        assert_eq!(d("10").checked_div(d("4")), Some(d("2.5")));
        assert_eq!(d("10").checked_div(Decimal::zero()), None);
    }

    #[test]
    fn test_pct_of() {
        assert_eq!(d("25").pct_of(d("1000")), Some(d("2.5")));
        assert_eq!(d("25").pct_of(Decimal::zero()), None);
    }

    #[test]
    fn test_max() {
        assert_eq!(d("-5").max(Decimal::zero()), Decimal::zero());
        assert_eq!(d("5").max(Decimal::zero()), d("5"));
    }

    #[test]
    fn test_json_serializes_as_number() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.456");
    }
}

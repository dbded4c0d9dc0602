//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A signed closing whose totals drift by a cent from the sum of its      │
//! │  receipts is a compliance finding, not a rounding nit.                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Euro Cents                                       │
//! │    Every amount in the system is an i64 number of cents.                │
//! │    The database, the canonical receipt string, and the closing          │
//! │    totals all use cents. Only display formatting converts.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in Euro cents (the smallest currency unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: allows negative values for refunds and corrections
/// - **Single field tuple struct**: zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use kassa_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10,99 €
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units (euros and cents).
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5,50 €.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (whole euros) portion.
    #[inline]
    pub const fn euros(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion, always 0-99.
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Calculates the tax portion for this gross-exclusive amount.
    ///
    /// Uses integer math with half-up rounding:
    /// `(amount_cents * bps + 5000) / 10000`.
    ///
    /// ## Example
    /// ```rust
    /// use kassa_core::money::Money;
    /// use kassa_core::types::TaxRate;
    ///
    /// let net = Money::from_cents(10000);  // 100,00 €
    /// let rate = TaxRate::from_bps(2000);  // 20% Austrian standard rate
    ///
    /// assert_eq!(net.calculate_tax(rate).cents(), 2000); // 20,00 €
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 to prevent overflow on large amounts
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Formats the amount the way the RKSV machine-readable code expects:
    /// sign, euros, comma, two cent digits. No currency symbol, no grouping.
    ///
    /// ## Example
    /// ```rust
    /// use kassa_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).to_rksv_string(), "10,99");
    /// assert_eq!(Money::from_cents(-550).to_rksv_string(), "-5,50");
    /// assert_eq!(Money::zero().to_rksv_string(), "0,00");
    /// ```
    pub fn to_rksv_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{},{:02}", sign, self.euros().abs(), self.cents_part())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display for logs and diagnostics. Receipt rendering is out of scope here;
/// the canonical wire format is [`Money::to_rksv_string`].
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} €", self.to_rksv_string())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.euros(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_rksv_string() {
        assert_eq!(Money::from_cents(1099).to_rksv_string(), "10,99");
        assert_eq!(Money::from_cents(500).to_rksv_string(), "5,00");
        assert_eq!(Money::from_cents(-550).to_rksv_string(), "-5,50");
        assert_eq!(Money::from_cents(0).to_rksv_string(), "0,00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
    }

    #[test]
    fn test_tax_calculation_standard_rate() {
        // 100,00 € at 20% = 20,00 €
        let amount = Money::from_cents(10000);
        let rate = TaxRate::from_bps(2000);
        assert_eq!(amount.calculate_tax(rate).cents(), 2000);
    }

    #[test]
    fn test_tax_calculation_with_rounding() {
        // 9,99 € at 13% = 1,2987 € → 1,30 €
        let amount = Money::from_cents(999);
        let rate = TaxRate::from_bps(1300);
        assert_eq!(amount.calculate_tax(rate).cents(), 130);
    }

    #[test]
    fn test_multiply_quantity() {
        let unit_price = Money::from_cents(299);
        assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_negative());
        assert!(Money::from_cents(-100).is_negative());
        assert_eq!(Money::from_cents(-550).abs().cents(), 550);
    }
}

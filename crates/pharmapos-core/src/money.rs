//! # Money Module
//!
//! Provides the `Money` type for every amount the register touches.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cash session totals are running sums over thousands of sales.          │
//! │                                                                         │
//! │  With floats:   0.1 + 0.2 = 0.30000000000000004                         │
//! │  After a shift: expected cash drifts by fractions of a cent and the     │
//! │                 blind count never balances exactly.                     │
//! │                                                                         │
//! │  With cents:    10 + 20 = 30, always. A balanced drawer has a           │
//! │                 difference of exactly 0.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pharmapos_core::money::Money;
//!
//! let price = Money::from_cents(4550);        // $45.50
//! let line = price.multiply_quantity(2);      // $91.00
//! assert_eq!(line.cents(), 9100);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

/// A monetary value in the smallest currency unit (centavos / cents).
///
/// Signed so that shortages and refunds can be represented directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use pharmapos_core::money::Money;
    ///
    /// let fund = Money::from_cents(100_000); // $1,000.00
    /// assert_eq!(fund.cents(), 100_000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Treats a missing amount as zero.
    ///
    /// Sale totals arrive optional from the frontend; a sale without a
    /// total contributes nothing to the register.
    #[inline]
    pub fn from_optional_cents(cents: Option<i64>) -> Self {
        Money(cents.unwrap_or(0))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Applies a percentage discount given in basis points (1000 = 10%).
    ///
    /// ```rust
    /// use pharmapos_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(20_000);
    /// assert_eq!(subtotal.apply_percentage_discount(1500).cents(), 17_000);
    /// ```
    pub fn apply_percentage_discount(&self, discount_bps: i64) -> Money {
        // i128 so that large lines cannot overflow before the division
        let discount_amount = (self.0 as i128 * discount_bps as i128 + 5000) / 10000;
        Money::from_cents(self.0 - discount_amount as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
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

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(4599);
        assert_eq!(money.cents(), 4599);
        assert_eq!(money.multiply_quantity(3).cents(), 13_797);
    }

    #[test]
    fn test_missing_total_is_zero() {
        assert_eq!(Money::from_optional_cents(None), Money::zero());
        assert_eq!(Money::from_optional_cents(Some(1500)).cents(), 1500);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(115_000)), "$1150.00");
        assert_eq!(format!("{}", Money::from_cents(-25_000)), "-$250.00");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
        assert_eq!(format!("{}", Money::from_cents(-5)), "-$0.05");
    }

    #[test]
    fn test_arithmetic() {
        let fund = Money::from_cents(100_000);
        let cash = Money::from_cents(20_000);
        let withdrawn = Money::from_cents(5_000);

        assert_eq!((fund + cash - withdrawn).cents(), 115_000);
        let mut drawer = fund;
        drawer -= withdrawn;
        drawer += cash;
        assert_eq!(drawer.cents(), 115_000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [1000, 2550, 450].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 4000);
    }

    #[test]
    fn test_percentage_discount() {
        let line = Money::from_cents(10_000);
        assert_eq!(line.apply_percentage_discount(1000).cents(), 9000);
        assert_eq!(line.apply_percentage_discount(0).cents(), 10_000);
    }

    #[test]
    fn test_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_cents(1).is_positive());
        assert!(Money::from_cents(-1).is_negative());
    }
}

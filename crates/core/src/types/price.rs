//! Money amounts using decimal arithmetic.
//!
//! The store trades in a single currency (IDR by default), so a [`Price`] is
//! just a non-negative decimal amount in major units. Floating point is never
//! used for money.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-negative monetary amount in the store currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
pub struct Price(Decimal);

impl Price {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of major units.
    #[must_use]
    pub fn from_major(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Amount rounded to whole major units, as payment processors that do
    /// not accept fractional IDR expect.
    #[must_use]
    pub fn whole_units(&self) -> i64 {
        use rust_decimal::RoundingStrategy;
        use rust_decimal::prelude::ToPrimitive;

        self.0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Unit price of a variant: base price plus the variant's modifier.
    ///
    /// Modifiers may be negative but the result never drops below zero.
    #[must_use]
    pub fn with_modifier(self, modifier: Decimal) -> Self {
        Self((self.0 + modifier).max(Decimal::ZERO))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.round_dp(2))
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<i32> for Price {
    type Output = Self;

    fn mul(self, quantity: i32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_arithmetic() {
        let unit = Price::from_major(125_000);
        assert_eq!(unit * 3, Price::from_major(375_000));
        assert_eq!(
            [unit * 2, Price::from_major(50_000)].into_iter().sum::<Price>(),
            Price::from_major(300_000)
        );
    }

    #[test]
    fn test_modifier_never_negative() {
        let base = Price::from_major(10_000);
        assert_eq!(base.with_modifier(Decimal::from(5_000)), Price::from_major(15_000));
        assert_eq!(base.with_modifier(Decimal::from(-20_000)), Price::ZERO);
    }

    #[test]
    fn test_whole_units_rounds() {
        assert_eq!(Price::new(Decimal::new(515_000_49, 2)).whole_units(), 515_000);
        assert_eq!(Price::new(Decimal::new(515_000_50, 2)).whole_units(), 515_001);
    }
}

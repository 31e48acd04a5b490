//! Order totals arithmetic.
//!
//! Shipping is a flat fee unless the subtotal is strictly greater than the
//! free-shipping threshold. Both numbers come from configuration.

use serde::{Deserialize, Serialize};

use crate::Price;

/// Shipping fee rules for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    /// Subtotals strictly above this ship for free.
    pub free_shipping_threshold: Price,
    /// Fee charged at or below the threshold.
    pub flat_fee: Price,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Price::from_major(500_000),
            flat_fee: Price::from_major(15_000),
        }
    }
}

impl ShippingPolicy {
    /// Shipping fee for an order with the given subtotal.
    #[must_use]
    pub fn fee_for(&self, subtotal: Price) -> Price {
        if subtotal > self.free_shipping_threshold {
            Price::ZERO
        } else {
            self.flat_fee
        }
    }
}

/// Subtotal, shipping fee and grand total of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub shipping_fee: Price,
    pub total: Price,
}

impl OrderTotals {
    /// Compute totals from `(unit_price, quantity)` lines.
    #[must_use]
    pub fn compute<I>(lines: I, policy: &ShippingPolicy) -> Self
    where
        I: IntoIterator<Item = (Price, i32)>,
    {
        let subtotal: Price = lines.into_iter().map(|(unit, qty)| unit * qty).sum();
        let shipping_fee = policy.fee_for(subtotal);
        Self {
            subtotal,
            shipping_fee,
            total: subtotal + shipping_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_shipping_just_above_threshold() {
        let totals = OrderTotals::compute(
            [(Price::from_major(500_001), 1)],
            &ShippingPolicy::default(),
        );
        assert_eq!(totals.shipping_fee, Price::ZERO);
        assert_eq!(totals.total, Price::from_major(500_001));
    }

    #[test]
    fn test_flat_fee_just_below_threshold() {
        let totals = OrderTotals::compute(
            [(Price::from_major(499_999), 1)],
            &ShippingPolicy::default(),
        );
        assert_eq!(totals.shipping_fee, Price::from_major(15_000));
        assert_eq!(totals.total, Price::from_major(514_999));
    }

    #[test]
    fn test_threshold_itself_is_not_free() {
        let policy = ShippingPolicy::default();
        assert_eq!(policy.fee_for(Price::from_major(500_000)), Price::from_major(15_000));
    }

    #[test]
    fn test_multi_line_subtotal_uses_configured_fee() {
        let policy = ShippingPolicy {
            free_shipping_threshold: Price::from_major(100),
            flat_fee: Price::from_major(7),
        };
        let totals = OrderTotals::compute(
            [(Price::from_major(20), 2), (Price::from_major(15), 3)],
            &policy,
        );
        assert_eq!(totals.subtotal, Price::from_major(85));
        assert_eq!(totals.shipping_fee, Price::from_major(7));
        assert_eq!(totals.total, Price::from_major(92));
    }

    #[test]
    fn test_empty_lines() {
        let totals = OrderTotals::compute(std::iter::empty(), &ShippingPolicy::default());
        assert_eq!(totals.subtotal, Price::ZERO);
    }
}

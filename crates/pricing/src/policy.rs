//! The pricing calculator.

use serde::{Deserialize, Serialize};

use bookstore_cart::{CartItem, subtotal_of};
use bookstore_core::{DomainError, DomainResult, Money, PaymentMethod};

use crate::breakdown::PriceBreakdown;

const BPS_DENOMINATOR: u128 = 10_000;

/// Store-wide pricing constants, in minor units.
///
/// Loaded from configuration; missing fields take the defaults
/// (free shipping from ₹500.00, ₹40.00 shipping, ₹40.00 COD handling, 5% tax).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    pub free_shipping_threshold: Money,
    pub shipping_fee: Money,
    pub cod_surcharge: Money,
    /// Tax rate in basis points (500 = 5%).
    pub tax_rate_bps: u32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: 50_000,
            shipping_fee: 4_000,
            cod_surcharge: 4_000,
            tax_rate_bps: 500,
        }
    }
}

impl PricingPolicy {
    /// Reject rates that cannot be a percentage.
    pub fn validate(&self) -> DomainResult<()> {
        if u128::from(self.tax_rate_bps) > BPS_DENOMINATOR {
            return Err(DomainError::validation("tax_rate_bps must be at most 10000"));
        }
        Ok(())
    }

    pub fn shipping_cost(&self, subtotal: Money) -> Money {
        if subtotal >= self.free_shipping_threshold {
            0
        } else {
            self.shipping_fee
        }
    }

    /// COD handling applies only below the free-shipping threshold.
    pub fn cod_surcharge(&self, subtotal: Money, method: Option<PaymentMethod>) -> Money {
        match method {
            Some(PaymentMethod::Cod) if subtotal < self.free_shipping_threshold => {
                self.cod_surcharge
            }
            _ => 0,
        }
    }

    /// Tax on the pre-discount subtotal, rounded half-up to the minor unit.
    pub fn tax_on(&self, subtotal: Money) -> Money {
        let scaled = u128::from(subtotal) * u128::from(self.tax_rate_bps);
        let rounded = (scaled + BPS_DENOMINATOR / 2) / BPS_DENOMINATOR;
        Money::try_from(rounded).unwrap_or(Money::MAX)
    }

    /// How much more the customer must add to qualify for free shipping.
    pub fn amount_to_free_shipping(&self, subtotal: Money) -> Money {
        self.free_shipping_threshold.saturating_sub(subtotal)
    }

    /// Price a subtotal.
    ///
    /// `discount` is clamped to `subtotal`, so `total` is never negative.
    pub fn quote(
        &self,
        subtotal: Money,
        method: Option<PaymentMethod>,
        discount: Money,
    ) -> PriceBreakdown {
        let discount = discount.min(subtotal);
        let shipping_cost = self.shipping_cost(subtotal);
        let cod_surcharge = self.cod_surcharge(subtotal, method);
        let tax_amount = self.tax_on(subtotal);

        let total = (subtotal - discount)
            .saturating_add(shipping_cost)
            .saturating_add(tax_amount)
            .saturating_add(cod_surcharge);

        tracing::debug!(
            subtotal,
            discount,
            shipping_cost,
            cod_surcharge,
            tax_amount,
            total,
            "priced cart"
        );

        PriceBreakdown {
            subtotal,
            discount,
            shipping_cost,
            cod_surcharge,
            tax_amount,
            total,
        }
    }

    /// Price a set of cart lines.
    pub fn quote_items(
        &self,
        items: &[CartItem],
        method: Option<PaymentMethod>,
        discount: Money,
    ) -> PriceBreakdown {
        self.quote(subtotal_of(items), method, discount)
    }
}

use serde::{Deserialize, Serialize};

use bookstore_core::{Money, ValueObject};

/// Derived totals for one pricing of the cart.
///
/// `discount` is the effective (clamped) discount, never more than `subtotal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping_cost: Money,
    pub cod_surcharge: Money,
    pub tax_amount: Money,
    pub total: Money,
}

impl PriceBreakdown {
    pub fn has_free_shipping(&self) -> bool {
        self.shipping_cost == 0
    }
}

impl ValueObject for PriceBreakdown {}

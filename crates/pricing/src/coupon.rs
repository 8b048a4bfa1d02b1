//! Coupons and the coupon-validation collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookstore_core::{DomainError, DomainResult, Money, format_money};

const BPS_DENOMINATOR: u64 = 10_000;

/// Why a coupon code did not produce a discount.
///
/// All variants are shown inline next to the coupon field; none aborts checkout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CouponError {
    #[error("coupon {0} is not valid")]
    Unknown(String),

    #[error("coupon requires a subtotal of at least {}", format_money(*min_subtotal))]
    BelowMinimum { min_subtotal: Money },

    /// The validation service could not be reached or answered nonsense.
    #[error("coupon service unavailable: {0}")]
    Unavailable(String),
}

/// Canonical form of a user-typed code: trimmed, upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponKind {
    /// Fixed amount off.
    Flat { amount: Money },
    /// Percentage off in basis points, optionally capped.
    Percent {
        bps: u32,
        #[serde(default)]
        max_discount: Option<Money>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCoupon")]
pub struct Coupon {
    code: String,
    kind: CouponKind,
    min_subtotal: Money,
}

/// Unvalidated coupon as it appears in configuration.
#[derive(Deserialize)]
struct RawCoupon {
    code: String,
    kind: CouponKind,
    #[serde(default)]
    min_subtotal: Money,
}

impl TryFrom<RawCoupon> for Coupon {
    type Error = DomainError;

    fn try_from(raw: RawCoupon) -> Result<Self, Self::Error> {
        Coupon::new(&raw.code, raw.kind, raw.min_subtotal)
    }
}

impl Coupon {
    pub fn new(code: &str, kind: CouponKind, min_subtotal: Money) -> DomainResult<Self> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(DomainError::validation("coupon code must not be empty"));
        }
        if let CouponKind::Percent { bps, .. } = kind {
            if bps == 0 || u64::from(bps) > BPS_DENOMINATOR {
                return Err(DomainError::validation("coupon percentage must be 1..=10000 bps"));
            }
        }

        Ok(Self {
            code,
            kind,
            min_subtotal,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> CouponKind {
        self.kind
    }

    pub fn min_subtotal(&self) -> Money {
        self.min_subtotal
    }

    /// Discount this coupon grants on `subtotal`, never more than `subtotal`.
    ///
    /// Percentages round down so a coupon never over-discounts.
    pub fn discount_for(&self, subtotal: Money) -> Result<Money, CouponError> {
        if subtotal < self.min_subtotal {
            return Err(CouponError::BelowMinimum {
                min_subtotal: self.min_subtotal,
            });
        }

        let discount = match self.kind {
            CouponKind::Flat { amount } => amount,
            CouponKind::Percent { bps, max_discount } => {
                let raw = u128::from(subtotal) * u128::from(bps) / u128::from(BPS_DENOMINATOR);
                let raw = Money::try_from(raw).unwrap_or(Money::MAX);
                max_discount.map_or(raw, |cap| raw.min(cap))
            }
        };

        Ok(discount.min(subtotal))
    }
}

/// External coupon validation: code + subtotal in, discount out.
#[async_trait]
pub trait CouponValidator: Send + Sync {
    async fn validate(&self, code: &str, subtotal: Money) -> Result<Money, CouponError>;
}

/// In-memory coupon book keyed by normalized code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Coupon>", into = "Vec<Coupon>")]
pub struct CouponTable {
    coupons: HashMap<String, Coupon>,
}

impl CouponTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a coupon.
    pub fn insert(&mut self, coupon: Coupon) {
        self.coupons.insert(coupon.code.clone(), coupon);
    }

    pub fn get(&self, code: &str) -> Option<&Coupon> {
        self.coupons.get(&normalize_code(code))
    }

    pub fn len(&self) -> usize {
        self.coupons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coupons.is_empty()
    }

    pub fn discount_for(&self, code: &str, subtotal: Money) -> Result<Money, CouponError> {
        self.get(code)
            .ok_or_else(|| CouponError::Unknown(normalize_code(code)))?
            .discount_for(subtotal)
    }
}

impl FromIterator<Coupon> for CouponTable {
    fn from_iter<T: IntoIterator<Item = Coupon>>(iter: T) -> Self {
        let mut table = CouponTable::new();
        for coupon in iter {
            table.insert(coupon);
        }
        table
    }
}

impl From<Vec<Coupon>> for CouponTable {
    fn from(value: Vec<Coupon>) -> Self {
        value.into_iter().collect()
    }
}

impl From<CouponTable> for Vec<Coupon> {
    fn from(value: CouponTable) -> Self {
        let mut coupons: Vec<Coupon> = value.coupons.into_values().collect();
        coupons.sort_by(|a, b| a.code.cmp(&b.code));
        coupons
    }
}

#[async_trait]
impl CouponValidator for CouponTable {
    async fn validate(&self, code: &str, subtotal: Money) -> Result<Money, CouponError> {
        self.discount_for(code, subtotal)
    }
}

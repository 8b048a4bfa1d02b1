//! Pricing domain module.
//!
//! One pure function prices a cart for every screen that shows a total, so the
//! cart page, the order-summary sidebar and the review step can never disagree.
//! Coupons only ever feed a discount amount into it.

pub mod breakdown;
pub mod coupon;
pub mod policy;

pub use breakdown::PriceBreakdown;
pub use coupon::{Coupon, CouponError, CouponKind, CouponTable, CouponValidator, normalize_code};
pub use policy::PricingPolicy;

//! Checkout-level error type.
//!
//! Lower-level errors (address/payment validation, coupons, domain decisions,
//! the Order API) convert into [`CheckoutError`] with `?`, the same way the
//! command pipeline maps `DomainError` into its own error enum.

use thiserror::Error;

use bookstore_core::DomainError;
use bookstore_pricing::CouponError;

use crate::address::AddressErrors;
use crate::order::OrderApiError;
use crate::payment::PaymentError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    /// The cart is empty; leave checkout and go back to the cart page.
    #[error("cart is empty")]
    EmptyCart,

    /// The cart is still loading its persisted contents; try again shortly.
    #[error("cart is still loading")]
    CartHydrating,

    #[error(transparent)]
    Address(#[from] AddressErrors),

    #[error("invalid payment details: {0}")]
    Payment(#[from] PaymentError),

    #[error("coupon not applied: {0}")]
    Coupon(#[from] CouponError),

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("order cannot be placed yet: {0}")]
    NotReadyToPlace(String),

    #[error("an order submission is already in progress")]
    SubmissionInFlight,

    /// The Order API call failed. Nothing was changed; the customer may retry.
    #[error("order submission failed: {0}")]
    Submission(#[from] OrderApiError),

    /// The flow already finished (order placed or redirected out).
    #[error("checkout is no longer active")]
    Closed,
}

impl CheckoutError {
    /// Whether the caller must navigate away from checkout.
    pub fn is_redirect(&self) -> bool {
        matches!(self, CheckoutError::EmptyCart)
    }

    /// Input the customer can correct in place (shown inline next to the form).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CheckoutError::Address(_)
                | CheckoutError::Payment(_)
                | CheckoutError::Domain(DomainError::Validation(_))
        )
    }

    /// Whether repeating the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::Submission(_)
                | CheckoutError::CartHydrating
                | CheckoutError::SubmissionInFlight
                | CheckoutError::Coupon(CouponError::Unavailable(_))
        )
    }
}

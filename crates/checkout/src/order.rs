//! Order submission contract with the backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookstore_cart::CartItem;
use bookstore_core::{BookId, IdempotencyKey, Money, OrderId, PaymentMethod};
use bookstore_pricing::PriceBreakdown;

use crate::address::Address;

/// One line of the order as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub book_id: BookId,
    pub title: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            book_id: item.book_id().clone(),
            title: item.title().to_string(),
            unit_price: item.unit_price(),
            quantity: item.quantity(),
        }
    }
}

/// Order body: what is being bought, where it goes, and what it costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDraft {
    pub items: Vec<OrderLine>,
    pub address: Address,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub cod_surcharge: Money,
    pub tax_amount: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderDraft {
    pub fn new(
        items: &[CartItem],
        address: Address,
        payment_method: PaymentMethod,
        coupon_code: Option<String>,
        price: PriceBreakdown,
    ) -> Self {
        Self {
            items: items.iter().map(OrderLine::from).collect(),
            address,
            payment_method,
            coupon_code,
            subtotal: price.subtotal,
            shipping_cost: price.shipping_cost,
            cod_surcharge: price.cod_surcharge,
            tax_amount: price.tax_amount,
            discount: price.discount,
            total: price.total,
        }
    }
}

/// A draft plus the idempotency key it is submitted under.
///
/// The key travels out-of-band (as a header), not in the JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceOrderRequest {
    #[serde(skip)]
    pub idempotency_key: IdempotencyKey,
    #[serde(flatten)]
    pub order: OrderDraft,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    pub estimated_delivery_date: NaiveDate,
}

/// Order API failure. Every variant is shown as a retryable message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("order rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// The backend's order endpoint (`POST /orders`).
///
/// Implementations must not retry on their own; retries are the customer's call.
#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> Result<OrderConfirmation, OrderApiError>;
}

#[async_trait]
impl<T: OrderApi + ?Sized> OrderApi for Arc<T> {
    async fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> Result<OrderConfirmation, OrderApiError> {
        (**self).place_order(request).await
    }
}

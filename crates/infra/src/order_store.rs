//! In-memory Order API for tests/dev.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use bookstore_checkout::{
    DeliveryTable, OrderApi, OrderApiError, OrderConfirmation, PlaceOrderRequest,
};
use bookstore_core::{IdempotencyKey, OrderId};

#[derive(Debug, Default)]
struct Ledger {
    requests: Vec<PlaceOrderRequest>,
    placed: HashMap<IdempotencyKey, OrderConfirmation>,
    failures: VecDeque<OrderApiError>,
    next_number: u64,
}

/// Order API stand-in.
///
/// - Records every request it receives, including failed ones
/// - Answers a repeated idempotency key with the original confirmation
/// - Fails the next calls with errors queued via [`InMemoryOrderApi::fail_next`]
/// - Estimates delivery from the address pincode using a [`DeliveryTable`]
#[derive(Debug, Default)]
pub struct InMemoryOrderApi {
    delivery: DeliveryTable,
    today: Option<NaiveDate>,
    ledger: Mutex<Ledger>,
}

impl InMemoryOrderApi {
    pub fn new(delivery: DeliveryTable) -> Self {
        Self {
            delivery,
            today: None,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Pin the order date used for delivery estimates.
    pub fn on_date(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Queue a failure for the next call.
    pub fn fail_next(&self, error: OrderApiError) {
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.failures.push_back(error);
        }
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<PlaceOrderRequest> {
        self.ledger
            .lock()
            .map(|ledger| ledger.requests.clone())
            .unwrap_or_default()
    }

    /// Number of distinct orders created.
    pub fn orders_placed(&self) -> usize {
        self.ledger
            .lock()
            .map(|ledger| ledger.placed.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl OrderApi for InMemoryOrderApi {
    async fn place_order(
        &self,
        request: &PlaceOrderRequest,
    ) -> Result<OrderConfirmation, OrderApiError> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| OrderApiError::Network("order ledger lock poisoned".to_string()))?;

        ledger.requests.push(request.clone());

        if let Some(error) = ledger.failures.pop_front() {
            debug!(error = %error, "scripted order failure");
            return Err(error);
        }

        let key = request.idempotency_key;
        if let Some(existing) = ledger.placed.get(&key) {
            debug!(idempotency_key = %key, order_id = %existing.order_id, "duplicate order submission");
            return Ok(existing.clone());
        }

        ledger.next_number += 1;
        let order_id = OrderId::new(format!("ORD-{:06}", ledger.next_number))
            .map_err(|e| OrderApiError::Decode(e.to_string()))?;
        let placed_on = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let estimate = self
            .delivery
            .estimate(request.order.address.zip_code(), placed_on);

        let confirmation = OrderConfirmation {
            order_id,
            estimated_delivery_date: estimate.date,
        };
        ledger.placed.insert(key, confirmation.clone());

        info!(
            order_id = %confirmation.order_id,
            total = request.order.total,
            delivery_days = estimate.days,
            "order accepted"
        );
        Ok(confirmation)
    }
}

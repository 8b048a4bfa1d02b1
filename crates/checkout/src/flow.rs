//! Checkout orchestration (application level).
//!
//! [`CheckoutFlow`] owns one [`CheckoutSession`] and runs every customer action
//! through the same pipeline:
//!
//! ```text
//! action
//!   ↓
//! 1. Re-check the cart (hydrated? still non-empty? snapshot current?)
//!   ↓
//! 2. Build a command and let the aggregate decide events (pure)
//!   ↓
//! 3. Apply the events to the session
//!   ↓
//! 4. Publish the events to the bus (best effort)
//! ```
//!
//! Order submission is the only async step. It is split into
//! [`CheckoutFlow::begin_submission`] and [`CheckoutFlow::complete_submission`]
//! so a caller can observe the pending state; [`CheckoutFlow::place_order`]
//! runs both around the injected [`OrderApi`].

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use bookstore_cart::{CartItem, CartStore};
use bookstore_core::{Aggregate, AggregateRoot, BookId, IdempotencyKey, Money, SessionId};
use bookstore_events::{EventBus, EventEnvelope};
use bookstore_pricing::{CouponError, CouponValidator, PriceBreakdown, PricingPolicy};

use crate::address::{AddressBook, AddressInput};
use crate::customer::{Customer, IdentityProvider};
use crate::delivery::{DeliveryEstimate, DeliveryTable};
use crate::error::CheckoutError;
use crate::order::{OrderApi, OrderApiError, OrderConfirmation, OrderDraft, PlaceOrderRequest};
use crate::payment::{PaymentInput, PaymentSelection};
use crate::session::{
    Advance, ApplyCoupon, CheckoutCommand, CheckoutEvent, CheckoutSession, EstablishCustomer,
    GoToStep, RecordOrderPlaced, RefreshCart, RemoveCoupon, SelectAddress, SelectPayment,
    StartCheckout,
};
use crate::step::{CheckoutStep, StepStatus};

/// Envelope type published for every decided checkout event.
pub type CheckoutEventEnvelope = EventEnvelope<CheckoutEvent>;

/// Where the flow stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStatus {
    /// Checkout in progress.
    Active(CheckoutSession),
    /// The order was placed; the session is gone.
    Completed(OrderConfirmation),
    /// The cart became empty; the caller should leave checkout.
    Redirected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Submission {
    Idle,
    Pending(IdempotencyKey),
}

/// Resets a pending submission to idle if dropped before it settles.
struct PendingSubmission<'a> {
    submission: &'a mut Submission,
    settled: bool,
}

impl<'a> PendingSubmission<'a> {
    fn new(submission: &'a mut Submission) -> Self {
        Self {
            submission,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingSubmission<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Submission::Pending(idempotency_key) = *self.submission {
            debug!(idempotency_key = %idempotency_key, "order submission dropped before completion");
            *self.submission = Submission::Idle;
        }
    }
}

/// One customer's checkout, wired to its collaborators.
///
/// - `C`: the cart (often `&mut InMemoryCart`)
/// - `A`: the Order API
/// - `B`: the event bus checkout events are published to
#[derive(Debug)]
pub struct CheckoutFlow<C, A, B> {
    cart: C,
    orders: A,
    bus: B,
    policy: PricingPolicy,
    status: FlowStatus,
    submission: Submission,
    coupon_stale: bool,
    last_request: Option<PlaceOrderRequest>,
    last_error: Option<OrderApiError>,
}

impl<C, A, B> CheckoutFlow<C, A, B>
where
    C: CartStore,
    A: OrderApi,
    B: EventBus<CheckoutEventEnvelope>,
{
    /// Enter checkout.
    ///
    /// A cart that is still hydrating yields [`CheckoutError::CartHydrating`];
    /// a hydrated empty cart yields [`CheckoutError::EmptyCart`]. A signed-in
    /// customer skips the Login step.
    pub fn enter(
        cart: C,
        identity: &impl IdentityProvider,
        orders: A,
        bus: B,
        policy: PricingPolicy,
    ) -> Result<Self, CheckoutError> {
        if !cart.is_ready() {
            debug!("checkout entered before cart hydration finished");
            return Err(CheckoutError::CartHydrating);
        }
        if cart.is_empty() {
            info!("checkout entered with an empty cart, redirecting");
            return Err(CheckoutError::EmptyCart);
        }

        let session_id = SessionId::new();
        let mut flow = Self {
            cart,
            orders,
            bus,
            policy,
            status: FlowStatus::Active(CheckoutSession::empty(session_id)),
            submission: Submission::Idle,
            coupon_stale: false,
            last_request: None,
            last_error: None,
        };

        let command = CheckoutCommand::StartCheckout(StartCheckout {
            session_id,
            customer: identity.current_customer(),
            items: flow.cart.items().to_vec(),
            occurred_at: Utc::now(),
        });
        flow.execute(command)?;

        info!(
            session_id = %session_id,
            step = %flow.current_step().map(CheckoutStep::label).unwrap_or_default(),
            lines = flow.cart.items().len(),
            "checkout started"
        );
        Ok(flow)
    }

    pub fn status(&self) -> &FlowStatus {
        &self.status
    }

    /// The live session, if checkout is still in progress.
    pub fn session(&self) -> Option<&CheckoutSession> {
        match &self.status {
            FlowStatus::Active(session) => Some(session),
            _ => None,
        }
    }

    pub fn cart(&self) -> &C {
        &self.cart
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    pub fn current_step(&self) -> Option<CheckoutStep> {
        self.session().map(CheckoutSession::current_step)
    }

    pub fn can_advance(&self) -> bool {
        self.session().is_some_and(CheckoutSession::can_advance)
    }

    pub fn step_statuses(&self) -> Option<[(CheckoutStep, StepStatus); 4]> {
        self.session().map(CheckoutSession::step_statuses)
    }

    pub fn confirmation(&self) -> Option<&OrderConfirmation> {
        match &self.status {
            FlowStatus::Completed(confirmation) => Some(confirmation),
            _ => None,
        }
    }

    /// Price the live cart with the chosen payment method and discount.
    ///
    /// Recomputed on every call; the sidebar and the review step both read this.
    pub fn quote(&self) -> PriceBreakdown {
        let session = self.session();
        self.policy.quote_items(
            self.cart.items(),
            session
                .and_then(CheckoutSession::payment)
                .map(PaymentSelection::method),
            session.map(CheckoutSession::discount).unwrap_or(0),
        )
    }

    /// Delivery date for the selected address, if one is selected.
    pub fn delivery_estimate(
        &self,
        table: &DeliveryTable,
        today: NaiveDate,
    ) -> Option<DeliveryEstimate> {
        let address = self.session()?.address()?;
        Some(table.estimate(address.zip_code(), today))
    }

    // --- Login ---

    /// Complete the Login step with whoever the identity provider reports.
    ///
    /// Returns `false` (and changes nothing) when nobody is signed in.
    pub fn sign_in(&mut self, identity: &impl IdentityProvider) -> Result<bool, CheckoutError> {
        match identity.current_customer() {
            Some(customer) => {
                self.establish(customer)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Complete the Login step as a guest.
    pub fn continue_as_guest(&mut self, email: &str) -> Result<(), CheckoutError> {
        let customer = Customer::guest(email)?;
        self.establish(customer)
    }

    fn establish(&mut self, customer: Customer) -> Result<(), CheckoutError> {
        self.sync_cart()?;
        let session_id = self.active()?.id_typed();
        self.execute(CheckoutCommand::EstablishCustomer(EstablishCustomer {
            session_id,
            customer,
            occurred_at: Utc::now(),
        }))?;

        // Logging in finishes the Login step; nowhere else does it move the flow.
        if self.current_step() == Some(CheckoutStep::Login) {
            self.advance()?;
        }
        Ok(())
    }

    // --- Address / Payment ---

    /// Validate and select a newly entered address. Does not advance.
    pub fn select_address(&mut self, input: &AddressInput) -> Result<(), CheckoutError> {
        let address = input.validate()?;
        self.sync_cart()?;
        let session_id = self.active()?.id_typed();
        self.execute(CheckoutCommand::SelectAddress(SelectAddress {
            session_id,
            address,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    /// Select one of the customer's saved addresses.
    pub fn select_saved_address(
        &mut self,
        book: &AddressBook,
        index: usize,
    ) -> Result<(), CheckoutError> {
        let address = book.get(index)?.clone();
        self.sync_cart()?;
        let session_id = self.active()?.id_typed();
        self.execute(CheckoutCommand::SelectAddress(SelectAddress {
            session_id,
            address,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    /// Validate and select payment details. Does not advance.
    pub fn select_payment(&mut self, input: &PaymentInput) -> Result<(), CheckoutError> {
        let payment = input.validate()?;
        self.sync_cart()?;
        let session_id = self.active()?.id_typed();
        self.execute(CheckoutCommand::SelectPayment(SelectPayment {
            session_id,
            payment,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    // --- Navigation ---

    /// Move to the next step. Returns `false` when the current step's guard is
    /// unmet (nothing changes in that case).
    pub fn advance(&mut self) -> Result<bool, CheckoutError> {
        self.sync_cart()?;
        let session_id = self.active()?.id_typed();
        let decided = self.execute(CheckoutCommand::Advance(Advance {
            session_id,
            occurred_at: Utc::now(),
        }))?;
        Ok(decided > 0)
    }

    /// Jump back to a completed step. Returns `false` for any other target.
    pub fn go_to_step(&mut self, target: CheckoutStep) -> Result<bool, CheckoutError> {
        self.sync_cart()?;
        let session_id = self.active()?.id_typed();
        let decided = self.execute(CheckoutCommand::GoToStep(GoToStep {
            session_id,
            target,
            occurred_at: Utc::now(),
        }))?;
        Ok(decided > 0)
    }

    // --- Coupons ---

    /// Validate `code` against the current subtotal and apply its discount.
    pub async fn apply_coupon(
        &mut self,
        code: &str,
        validator: &(impl CouponValidator + ?Sized),
    ) -> Result<Money, CheckoutError> {
        self.sync_cart()?;
        let session_id = self.active()?.id_typed();
        let subtotal = self.cart.total_price();

        let discount = validator.validate(code, subtotal).await?;
        self.execute(CheckoutCommand::ApplyCoupon(ApplyCoupon {
            session_id,
            code: code.to_string(),
            discount,
            occurred_at: Utc::now(),
        }))?;
        self.coupon_stale = false;

        debug!(discount, subtotal, "coupon applied");
        Ok(discount)
    }

    pub fn remove_coupon(&mut self) -> Result<(), CheckoutError> {
        self.sync_cart()?;
        let session_id = self.active()?.id_typed();
        self.execute(CheckoutCommand::RemoveCoupon(RemoveCoupon {
            session_id,
            occurred_at: Utc::now(),
        }))?;
        self.coupon_stale = false;
        Ok(())
    }

    /// Whether the cart changed since the applied coupon was last validated.
    pub fn coupon_needs_revalidation(&self) -> bool {
        self.coupon_stale
    }

    /// Re-check the applied coupon against the current subtotal.
    ///
    /// A coupon the validator now rejects is removed and the rejection is
    /// returned. When the validator is unreachable the coupon is kept and
    /// stays marked for revalidation.
    pub async fn revalidate_coupon(
        &mut self,
        validator: &(impl CouponValidator + ?Sized),
    ) -> Result<Option<Money>, CheckoutError> {
        self.sync_cart()?;
        let Some(code) = self.active()?.coupon_code().map(str::to_string) else {
            self.coupon_stale = false;
            return Ok(None);
        };

        match self.apply_coupon(&code, validator).await {
            Ok(discount) => Ok(Some(discount)),
            Err(CheckoutError::Coupon(CouponError::Unavailable(reason))) => {
                warn!(code = %code, reason = %reason, "coupon revalidation unavailable");
                Err(CheckoutError::Coupon(CouponError::Unavailable(reason)))
            }
            Err(CheckoutError::Coupon(rejection)) => {
                info!(code = %code, reason = %rejection, "coupon no longer applies, removing");
                self.remove_coupon()?;
                Err(CheckoutError::Coupon(rejection))
            }
            Err(other) => Err(other),
        }
    }

    // --- Cart ---

    /// Change a line's quantity from within checkout (0 removes the line).
    pub fn update_quantity(&mut self, id: &BookId, quantity: u32) -> Result<(), CheckoutError> {
        self.ensure_idle()?;
        self.active()?;
        self.cart.update_quantity(id, quantity)?;
        self.sync_cart()?;
        Ok(())
    }

    pub fn remove_item(&mut self, id: &BookId) -> Result<Option<CartItem>, CheckoutError> {
        self.ensure_idle()?;
        self.active()?;
        let removed = self.cart.remove_item(id);
        self.sync_cart()?;
        Ok(removed)
    }

    /// Re-check the cart and bring the session's snapshot up to date.
    ///
    /// An empty cart discards the session and returns
    /// [`CheckoutError::EmptyCart`]. Returns whether the snapshot changed.
    pub fn sync_cart(&mut self) -> Result<bool, CheckoutError> {
        self.ensure_idle()?;
        let session = self.active()?;
        let session_id = session.id_typed();
        let has_coupon = session.coupon_code().is_some();

        if !self.cart.is_ready() {
            return Err(CheckoutError::CartHydrating);
        }
        if self.cart.is_empty() {
            info!(session_id = %session_id, "cart emptied during checkout, redirecting");
            self.status = FlowStatus::Redirected;
            self.last_request = None;
            return Err(CheckoutError::EmptyCart);
        }

        let items = self.cart.items().to_vec();
        let decided = self.execute(CheckoutCommand::RefreshCart(RefreshCart {
            session_id,
            items,
            occurred_at: Utc::now(),
        }))?;

        let changed = decided > 0;
        if changed && has_coupon {
            self.coupon_stale = true;
        }
        Ok(changed)
    }

    // --- Submission ---

    pub fn is_submitting(&self) -> bool {
        matches!(self.submission, Submission::Pending(_))
    }

    /// Whether the "Place Order" control should be enabled.
    pub fn can_place_order(&self) -> bool {
        !self.is_submitting()
            && !self.coupon_stale
            && self.cart.is_ready()
            && !self.cart.is_empty()
            && self.session().is_some_and(CheckoutSession::is_ready_to_place)
    }

    /// The most recent Order API failure, cleared when a new attempt starts.
    pub fn last_submission_error(&self) -> Option<&OrderApiError> {
        self.last_error.as_ref()
    }

    /// Build the order request and mark a submission as pending.
    ///
    /// Retrying an identical order after a failure reuses the previous
    /// idempotency key; any change to the order mints a new one.
    pub fn begin_submission(&mut self) -> Result<PlaceOrderRequest, CheckoutError> {
        if self.is_submitting() {
            return Err(CheckoutError::SubmissionInFlight);
        }
        self.sync_cart()?;
        if self.coupon_stale {
            return Err(CheckoutError::NotReadyToPlace(
                "coupon must be revalidated for the updated cart".to_string(),
            ));
        }

        let session = self.active()?;
        if session.current_step() != CheckoutStep::Review {
            return Err(CheckoutError::NotReadyToPlace(format!(
                "order can only be placed from the review step, currently at {}",
                session.current_step().label()
            )));
        }
        let address = session
            .address()
            .cloned()
            .ok_or_else(|| CheckoutError::NotReadyToPlace("no delivery address".to_string()))?;
        let method = session
            .payment()
            .map(PaymentSelection::method)
            .ok_or_else(|| CheckoutError::NotReadyToPlace("no payment method".to_string()))?;
        let coupon_code = session.coupon_code().map(str::to_string);
        let session_id = session.id_typed();

        let order = OrderDraft::new(self.cart.items(), address, method, coupon_code, self.quote());
        let idempotency_key = match &self.last_request {
            Some(previous) if previous.order == order => previous.idempotency_key,
            _ => IdempotencyKey::new(),
        };
        let request = PlaceOrderRequest {
            idempotency_key,
            order,
        };

        self.last_request = Some(request.clone());
        self.last_error = None;
        self.submission = Submission::Pending(idempotency_key);

        info!(
            session_id = %session_id,
            idempotency_key = %idempotency_key,
            total = request.order.total,
            "submitting order"
        );
        Ok(request)
    }

    /// Record the outcome of the Order API call started by `begin_submission`.
    ///
    /// On success the cart is cleared once and the flow completes. On failure
    /// nothing but the error is recorded; the customer may retry.
    pub fn complete_submission(
        &mut self,
        result: Result<OrderConfirmation, OrderApiError>,
    ) -> Result<OrderConfirmation, CheckoutError> {
        let Submission::Pending(idempotency_key) = self.submission else {
            return Err(CheckoutError::NotReadyToPlace(
                "no order submission in progress".to_string(),
            ));
        };
        self.submission = Submission::Idle;

        match result {
            Ok(confirmation) => {
                let total = self
                    .last_request
                    .as_ref()
                    .map(|request| request.order.total)
                    .unwrap_or_default();

                if let Some(session_id) = self.session().map(CheckoutSession::id_typed) {
                    let recorded = self.execute(CheckoutCommand::RecordOrderPlaced(
                        RecordOrderPlaced {
                            session_id,
                            order_id: confirmation.order_id.clone(),
                            total,
                            occurred_at: Utc::now(),
                        },
                    ));
                    // The backend already accepted the order; completion must not be lost.
                    if let Err(err) = recorded {
                        warn!(error = %err, "order placed but session could not record it");
                    }
                }

                self.cart.clear();
                self.last_request = None;
                self.last_error = None;
                self.coupon_stale = false;
                self.status = FlowStatus::Completed(confirmation.clone());

                info!(
                    order_id = %confirmation.order_id,
                    idempotency_key = %idempotency_key,
                    estimated_delivery = %confirmation.estimated_delivery_date,
                    total,
                    "order placed"
                );
                Ok(confirmation)
            }
            Err(err) => {
                warn!(
                    idempotency_key = %idempotency_key,
                    error = %err,
                    "order submission failed"
                );
                self.last_error = Some(err.clone());
                Err(CheckoutError::Submission(err))
            }
        }
    }

    /// Forget a pending submission whose future was dropped.
    ///
    /// The request is kept, so retrying the same order reuses its key.
    pub fn abandon_submission(&mut self) {
        if let Submission::Pending(idempotency_key) = self.submission {
            debug!(idempotency_key = %idempotency_key, "order submission abandoned");
            self.submission = Submission::Idle;
        }
    }

    /// Submit the order through the injected Order API.
    ///
    /// Dropping the returned future before it resolves abandons the
    /// submission: the flow goes back to idle and a retry of the same order
    /// reuses the idempotency key.
    pub async fn place_order(&mut self) -> Result<OrderConfirmation, CheckoutError> {
        let request = self.begin_submission()?;
        let result = {
            let pending = PendingSubmission::new(&mut self.submission);
            let result = self.orders.place_order(&request).await;
            pending.settle();
            result
        };
        self.complete_submission(result)
    }

    // --- internals ---

    fn active(&self) -> Result<&CheckoutSession, CheckoutError> {
        match &self.status {
            FlowStatus::Active(session) => Ok(session),
            FlowStatus::Redirected => Err(CheckoutError::EmptyCart),
            FlowStatus::Completed(_) => Err(CheckoutError::Closed),
        }
    }

    fn ensure_idle(&self) -> Result<(), CheckoutError> {
        if self.is_submitting() {
            return Err(CheckoutError::SubmissionInFlight);
        }
        Ok(())
    }

    /// Decide, apply and publish. Returns the number of events decided.
    fn execute(&mut self, command: CheckoutCommand) -> Result<usize, CheckoutError> {
        let FlowStatus::Active(session) = &mut self.status else {
            return Err(CheckoutError::Closed);
        };

        let before = session.current_step();
        let events = session.execute(&command)?;
        let after = session.current_step();
        let session_id = session.id_typed();
        let first_sequence = session.version() + 1 - events.len() as u64;

        if before != after {
            info!(session_id = %session_id, from = %before, to = %after, "checkout step changed");
        }

        let decided = events.len();
        for (offset, event) in events.into_iter().enumerate() {
            let envelope = EventEnvelope::wrap(session_id, first_sequence + offset as u64, event);
            let event_type = envelope.event_type().to_string();
            if let Err(err) = self.bus.publish(envelope) {
                warn!(
                    session_id = %session_id,
                    event_type = %event_type,
                    error = ?err,
                    "failed to publish checkout event"
                );
            }
        }
        Ok(decided)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, mpsc};

    use async_trait::async_trait;
    use bookstore_cart::InMemoryCart;
    use bookstore_core::{DomainError, OrderId, PaymentMethod};
    use bookstore_events::{InMemoryEventBus, Subscription};
    use bookstore_pricing::{Coupon, CouponKind, CouponTable};

    use super::*;
    use crate::address::AddressType;
    use crate::customer::{Anonymous, StaticIdentity};

    /// Order API double: answers from a script, records every request.
    #[derive(Default)]
    struct ScriptedOrders {
        script: Mutex<VecDeque<Result<OrderConfirmation, OrderApiError>>>,
        requests: Mutex<Vec<PlaceOrderRequest>>,
    }

    impl ScriptedOrders {
        fn answering(
            answers: impl IntoIterator<Item = Result<OrderConfirmation, OrderApiError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(answers.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<PlaceOrderRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrderApi for ScriptedOrders {
        async fn place_order(
            &self,
            request: &PlaceOrderRequest,
        ) -> Result<OrderConfirmation, OrderApiError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(OrderApiError::Network("script exhausted".to_string())))
        }
    }

    struct BrokenBus;

    impl EventBus<CheckoutEventEnvelope> for BrokenBus {
        type Error = &'static str;

        fn publish(&self, _message: CheckoutEventEnvelope) -> Result<(), Self::Error> {
            Err("bus offline")
        }

        fn subscribe(&self) -> Subscription<CheckoutEventEnvelope> {
            let (_tx, rx) = mpsc::channel();
            Subscription::new(rx)
        }
    }

    type TestFlow<'a> =
        CheckoutFlow<&'a mut InMemoryCart, Arc<ScriptedOrders>, Arc<InMemoryEventBus<CheckoutEventEnvelope>>>;

    fn test_bus() -> Arc<InMemoryEventBus<CheckoutEventEnvelope>> {
        Arc::new(InMemoryEventBus::new())
    }

    fn test_cart() -> InMemoryCart {
        let mut cart = InMemoryCart::new();
        cart.add_item(
            CartItem::new(BookId::new("b-1").unwrap(), "Dune", "Frank Herbert", 15_000, 1).unwrap(),
        );
        cart.add_item(
            CartItem::new(BookId::new("b-2").unwrap(), "Emma", "Jane Austen", 20_000, 1).unwrap(),
        );
        cart
    }

    fn test_address_input() -> AddressInput {
        AddressInput {
            full_name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            street: "12 MG Road".to_string(),
            landmark: String::new(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            zip_code: "560001".to_string(),
            address_type: AddressType::Home,
        }
    }

    fn test_confirmation(id: &str) -> OrderConfirmation {
        OrderConfirmation {
            order_id: OrderId::new(id).unwrap(),
            estimated_delivery_date: NaiveDate::from_ymd_opt(2026, 10, 21).unwrap(),
        }
    }

    fn test_identity() -> StaticIdentity {
        StaticIdentity::new(Customer::registered("Asha Rao", "asha@example.in").unwrap())
    }

    fn enter<'a>(cart: &'a mut InMemoryCart, orders: Arc<ScriptedOrders>) -> TestFlow<'a> {
        CheckoutFlow::enter(
            cart,
            &test_identity(),
            orders,
            test_bus(),
            PricingPolicy::default(),
        )
        .unwrap()
    }

    /// Signed in, address and COD selected, sitting at Review.
    fn to_review(flow: &mut TestFlow<'_>) {
        flow.select_address(&test_address_input()).unwrap();
        assert!(flow.advance().unwrap());
        flow.select_payment(&PaymentInput::Cod).unwrap();
        assert!(flow.advance().unwrap());
        assert_eq!(flow.current_step(), Some(CheckoutStep::Review));
    }

    #[test]
    fn entering_with_empty_cart_redirects() {
        let mut cart = InMemoryCart::new();
        let result = CheckoutFlow::enter(
            &mut cart,
            &Anonymous,
            ScriptedOrders::answering([]),
            test_bus(),
            PricingPolicy::default(),
        );
        match result {
            Err(err) => assert!(err.is_redirect()),
            Ok(_) => panic!("Expected redirect for empty cart"),
        }
    }

    #[test]
    fn entering_while_hydrating_waits_instead_of_redirecting() {
        let mut cart = InMemoryCart::hydrating();
        match CheckoutFlow::enter(
            &mut cart,
            &Anonymous,
            ScriptedOrders::answering([]),
            test_bus(),
            PricingPolicy::default(),
        ) {
            Err(CheckoutError::CartHydrating) => {}
            _ => panic!("Expected CartHydrating"),
        }

        cart.hydrate(test_cart().items().to_vec());
        let flow = CheckoutFlow::enter(
            &mut cart,
            &Anonymous,
            ScriptedOrders::answering([]),
            test_bus(),
            PricingPolicy::default(),
        )
        .unwrap();
        assert_eq!(flow.current_step(), Some(CheckoutStep::Login));
    }

    #[test]
    fn guest_login_moves_to_address() {
        let mut cart = test_cart();
        let mut flow = CheckoutFlow::enter(
            &mut cart,
            &Anonymous,
            ScriptedOrders::answering([]),
            test_bus(),
            PricingPolicy::default(),
        )
        .unwrap();

        assert!(!flow.can_advance());
        assert!(!flow.sign_in(&Anonymous).unwrap());
        assert_eq!(flow.current_step(), Some(CheckoutStep::Login));

        flow.continue_as_guest("reader@example.in").unwrap();
        assert_eq!(flow.current_step(), Some(CheckoutStep::Address));
        assert!(flow.session().unwrap().customer().unwrap().is_guest());
    }

    #[test]
    fn advance_without_address_stays_put() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));
        assert_eq!(flow.current_step(), Some(CheckoutStep::Address));

        assert!(!flow.advance().unwrap());
        assert_eq!(flow.current_step(), Some(CheckoutStep::Address));
    }

    #[test]
    fn invalid_address_reports_every_field() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));

        let mut input = test_address_input();
        input.phone = "12345".to_string();
        input.zip_code = "5600".to_string();

        match flow.select_address(&input) {
            Err(CheckoutError::Address(errors)) => {
                assert!(errors.for_field("phone").is_some());
                assert!(errors.for_field("zip_code").is_some());
            }
            _ => panic!("Expected address validation errors"),
        }
        assert!(flow.session().unwrap().address().is_none());
    }

    #[test]
    fn every_decided_event_is_published_in_sequence() {
        let mut cart = test_cart();
        let bus = test_bus();
        let subscription = bus.subscribe();
        let mut flow = CheckoutFlow::enter(
            &mut cart,
            &test_identity(),
            ScriptedOrders::answering([]),
            bus.clone(),
            PricingPolicy::default(),
        )
        .unwrap();

        flow.advance().unwrap(); // inert, publishes nothing
        flow.select_address(&test_address_input()).unwrap();
        flow.advance().unwrap();

        let published = subscription.drain();
        let types: Vec<&str> = published.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec!["checkout.started", "checkout.address_selected", "checkout.step_changed"]
        );
        let sequences: Vec<u64> = published.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn bus_failure_never_fails_checkout() {
        let mut cart = test_cart();
        let mut flow = CheckoutFlow::enter(
            &mut cart,
            &test_identity(),
            ScriptedOrders::answering([]),
            BrokenBus,
            PricingPolicy::default(),
        )
        .unwrap();

        flow.select_address(&test_address_input()).unwrap();
        assert!(flow.advance().unwrap());
        assert_eq!(flow.current_step(), Some(CheckoutStep::Payment));
    }

    #[test]
    fn review_total_for_cash_on_delivery() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));
        to_review(&mut flow);

        let quote = flow.quote();
        assert_eq!(quote.subtotal, 35_000);
        assert_eq!(quote.shipping_cost, 4_000);
        assert_eq!(quote.cod_surcharge, 4_000);
        assert_eq!(quote.tax_amount, 1_750);
        assert_eq!(quote.total, 44_750);
    }

    #[test]
    fn going_back_to_address_keeps_selections() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));
        to_review(&mut flow);

        assert!(flow.go_to_step(CheckoutStep::Address).unwrap());
        let session = flow.session().unwrap();
        assert_eq!(session.current_step(), CheckoutStep::Address);
        assert!(session.address().is_some());
        assert_eq!(
            session.payment().map(PaymentSelection::method),
            Some(PaymentMethod::Cod)
        );

        assert!(!flow.go_to_step(CheckoutStep::Review).unwrap());
    }

    #[test]
    fn emptying_the_cart_mid_checkout_redirects() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));

        flow.remove_item(&BookId::new("b-1").unwrap()).unwrap();
        let err = flow.update_quantity(&BookId::new("b-2").unwrap(), 0).unwrap_err();

        assert!(err.is_redirect());
        assert_eq!(flow.status(), &FlowStatus::Redirected);
        assert!(flow.session().is_none());
        assert!(flow.advance().unwrap_err().is_redirect());
    }

    #[test]
    fn quantity_change_refreshes_snapshot_and_quote() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));

        flow.update_quantity(&BookId::new("b-2").unwrap(), 2).unwrap();

        assert_eq!(flow.session().unwrap().subtotal(), 55_000);
        let quote = flow.quote();
        assert_eq!(quote.shipping_cost, 0);
        assert_eq!(quote.tax_amount, 2_750);
    }

    #[tokio::test]
    async fn successful_order_clears_cart_once_and_completes() {
        let orders = ScriptedOrders::answering([Ok(test_confirmation("ORD-1001"))]);
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, orders.clone());
        to_review(&mut flow);

        let confirmation = flow.place_order().await.unwrap();

        assert_eq!(confirmation.order_id.as_str(), "ORD-1001");
        assert_eq!(flow.confirmation(), Some(&confirmation));
        assert!(flow.session().is_none());
        assert!(flow.cart().is_empty());

        let requests = orders.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].order.total, 44_750);
        assert_eq!(requests[0].order.cod_surcharge, 4_000);
        assert_eq!(requests[0].order.payment_method, PaymentMethod::Cod);

        match flow.place_order().await {
            Err(CheckoutError::Closed) => {}
            _ => panic!("Expected a closed flow after completion"),
        }
    }

    #[tokio::test]
    async fn failed_order_changes_nothing_and_is_retryable() {
        let orders = ScriptedOrders::answering([
            Err(OrderApiError::Network("connection reset".to_string())),
            Ok(test_confirmation("ORD-1002")),
        ]);
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, orders.clone());
        to_review(&mut flow);
        let before = flow.session().unwrap().clone();

        let err = flow.place_order().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(flow.session(), Some(&before));
        assert_eq!(flow.cart().items().len(), 2);
        assert!(!flow.is_submitting());
        assert_eq!(
            flow.last_submission_error(),
            Some(&OrderApiError::Network("connection reset".to_string()))
        );

        flow.place_order().await.unwrap();
        assert!(flow.last_submission_error().is_none());

        let requests = orders.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].idempotency_key, requests[1].idempotency_key);
    }

    #[tokio::test]
    async fn changed_order_gets_a_new_idempotency_key() {
        let orders = ScriptedOrders::answering([
            Err(OrderApiError::Rejected {
                status: 503,
                message: "try later".to_string(),
            }),
            Ok(test_confirmation("ORD-1003")),
        ]);
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, orders.clone());
        to_review(&mut flow);

        flow.place_order().await.unwrap_err();

        flow.go_to_step(CheckoutStep::Payment).unwrap();
        flow.select_payment(&PaymentInput::Upi {
            vpa: "asha@okbank".to_string(),
        })
        .unwrap();
        flow.advance().unwrap();
        flow.place_order().await.unwrap();

        let requests = orders.requests();
        assert_ne!(requests[0].idempotency_key, requests[1].idempotency_key);
        assert_eq!(requests[1].order.cod_surcharge, 0);
        assert_eq!(requests[1].order.total, 40_750);
    }

    #[test]
    fn only_one_submission_in_flight() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));
        to_review(&mut flow);

        let request = flow.begin_submission().unwrap();
        assert!(flow.is_submitting());
        assert!(!flow.can_place_order());

        match flow.begin_submission() {
            Err(CheckoutError::SubmissionInFlight) => {}
            _ => panic!("Expected SubmissionInFlight"),
        }
        match flow.go_to_step(CheckoutStep::Address) {
            Err(CheckoutError::SubmissionInFlight) => {}
            _ => panic!("Expected navigation to be blocked while submitting"),
        }

        flow.abandon_submission();
        assert!(!flow.is_submitting());
        assert!(flow.can_place_order());

        // The abandoned call may have reached the backend: same order, same key.
        let retry = flow.begin_submission().unwrap();
        assert_eq!(retry.idempotency_key, request.idempotency_key);
    }

    /// Order API whose first call never answers.
    #[derive(Default)]
    struct StalledOnce {
        calls: Mutex<Vec<PlaceOrderRequest>>,
    }

    #[async_trait]
    impl OrderApi for StalledOnce {
        async fn place_order(
            &self,
            request: &PlaceOrderRequest,
        ) -> Result<OrderConfirmation, OrderApiError> {
            let first = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(request.clone());
                calls.len() == 1
            };
            if first {
                std::future::pending::<()>().await;
            }
            Ok(test_confirmation("ORD-1005"))
        }
    }

    #[tokio::test]
    async fn dropped_submission_returns_to_idle_and_keeps_the_key() {
        let orders = Arc::new(StalledOnce::default());
        let mut cart = test_cart();
        let mut flow = CheckoutFlow::enter(
            &mut cart,
            &test_identity(),
            orders.clone(),
            test_bus(),
            PricingPolicy::default(),
        )
        .unwrap();
        flow.select_address(&test_address_input()).unwrap();
        flow.advance().unwrap();
        flow.select_payment(&PaymentInput::Cod).unwrap();
        flow.advance().unwrap();

        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(20), flow.place_order()).await;
        assert!(timed_out.is_err());

        assert!(!flow.is_submitting());
        assert!(flow.can_place_order());
        assert!(flow.go_to_step(CheckoutStep::Payment).unwrap());
        assert!(flow.advance().unwrap());

        let confirmation = flow.place_order().await.unwrap();
        assert_eq!(confirmation.order_id.as_str(), "ORD-1005");

        let calls = orders.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].idempotency_key, calls[1].idempotency_key);
    }

    #[test]
    fn saved_address_is_selected_by_index() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));
        let mut book = AddressBook::new();
        let saved = test_address_input().validate().unwrap();
        let index = book.save(saved.clone());

        let before = flow.session().unwrap().clone();
        match flow.select_saved_address(&book, index + 1) {
            Err(CheckoutError::Domain(DomainError::NotFound)) => {}
            _ => panic!("Expected NotFound for an unknown saved address"),
        }
        assert_eq!(flow.session(), Some(&before));

        flow.select_saved_address(&book, index).unwrap();
        assert!(flow.advance().unwrap());
        assert_eq!(flow.current_step(), Some(CheckoutStep::Payment));
        assert_eq!(flow.session().unwrap().address(), Some(&saved));
    }

    #[test]
    fn guest_cannot_replace_a_signed_in_customer() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));
        to_review(&mut flow);

        match flow.continue_as_guest("someone@example.in") {
            Err(CheckoutError::Domain(DomainError::Validation(_))) => {}
            _ => panic!("Expected re-identification to be refused"),
        }
        let session = flow.session().unwrap();
        assert!(!session.customer().unwrap().is_guest());
        assert_eq!(session.current_step(), CheckoutStep::Review);

        assert!(flow.sign_in(&test_identity()).unwrap());
        assert_eq!(flow.current_step(), Some(CheckoutStep::Review));
    }

    #[test]
    fn placing_before_review_is_refused() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));
        flow.select_address(&test_address_input()).unwrap();

        match flow.begin_submission() {
            Err(CheckoutError::NotReadyToPlace(msg)) if msg.contains("review step") => {}
            _ => panic!("Expected NotReadyToPlace"),
        }
        assert!(!flow.can_place_order());
    }

    #[tokio::test]
    async fn coupon_discount_flows_into_order() {
        let coupons: CouponTable = [Coupon::new(
            "read10",
            CouponKind::Percent {
                bps: 1_000,
                max_discount: None,
            },
            0,
        )
        .unwrap()]
        .into_iter()
        .collect();

        let orders = ScriptedOrders::answering([Ok(test_confirmation("ORD-1004"))]);
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, orders.clone());

        let discount = flow.apply_coupon("Read10", &coupons).await.unwrap();
        assert_eq!(discount, 3_500);
        to_review(&mut flow);

        let quote = flow.quote();
        assert_eq!(quote.discount, 3_500);
        assert_eq!(quote.tax_amount, 1_750);
        assert_eq!(quote.total, 41_250);

        flow.place_order().await.unwrap();
        let requests = orders.requests();
        assert_eq!(requests[0].order.coupon_code.as_deref(), Some("READ10"));
        assert_eq!(requests[0].order.discount, 3_500);
    }

    #[tokio::test]
    async fn cart_change_requires_coupon_revalidation() {
        let coupons: CouponTable = [Coupon::new("FLAT50", CouponKind::Flat { amount: 5_000 }, 30_000)
            .unwrap()]
        .into_iter()
        .collect();

        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));
        flow.apply_coupon("flat50", &coupons).await.unwrap();
        to_review(&mut flow);

        flow.remove_item(&BookId::new("b-2").unwrap()).unwrap();
        assert!(flow.coupon_needs_revalidation());
        assert!(!flow.can_place_order());

        match flow.revalidate_coupon(&coupons).await {
            Err(CheckoutError::Coupon(CouponError::BelowMinimum { min_subtotal })) => {
                assert_eq!(min_subtotal, 30_000);
            }
            _ => panic!("Expected coupon to fall below its minimum"),
        }
        assert!(!flow.coupon_needs_revalidation());
        assert_eq!(flow.session().unwrap().coupon_code(), None);
        assert_eq!(flow.quote().discount, 0);
        assert!(flow.can_place_order());
    }

    #[test]
    fn delivery_estimate_uses_selected_pincode() {
        let mut cart = test_cart();
        let mut flow = enter(&mut cart, ScriptedOrders::answering([]));
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let table = DeliveryTable::default();

        assert!(flow.delivery_estimate(&table, today).is_none());
        flow.select_address(&test_address_input()).unwrap();

        let estimate = flow.delivery_estimate(&table, today).unwrap();
        assert_eq!(estimate.city.as_deref(), Some("Bengaluru"));
        assert_eq!(estimate.date, NaiveDate::from_ymd_opt(2026, 10, 21).unwrap());
    }
}

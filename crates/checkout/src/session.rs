use chrono::{DateTime, Utc};
use serde::Serialize;

use bookstore_cart::{CartItem, subtotal_of};
use bookstore_core::{Aggregate, AggregateRoot, DomainError, Money, OrderId, SessionId};
use bookstore_events::Event;
use bookstore_pricing::{PriceBreakdown, PricingPolicy, normalize_code};

use crate::address::Address;
use crate::customer::Customer;
use crate::payment::PaymentSelection;
use crate::step::{CheckoutStep, StepStatus};

/// Aggregate root: CheckoutSession.
///
/// Forward moves are guarded (customer to leave Login, address to leave
/// Address, payment to leave Payment); backward moves to any earlier step are
/// free and keep everything entered so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    id: SessionId,
    step: CheckoutStep,
    customer: Option<Customer>,
    cart_snapshot: Vec<CartItem>,
    address: Option<Address>,
    payment: Option<PaymentSelection>,
    coupon_code: Option<String>,
    discount: Money,
    placed_order: Option<OrderId>,
    version: u64,
    created: bool,
}

impl CheckoutSession {
    /// Create an empty, not-yet-started aggregate instance for rehydration.
    pub fn empty(id: SessionId) -> Self {
        Self {
            id,
            step: CheckoutStep::Login,
            customer: None,
            cart_snapshot: Vec::new(),
            address: None,
            payment: None,
            coupon_code: None,
            discount: 0,
            placed_order: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SessionId {
        self.id
    }

    pub fn current_step(&self) -> CheckoutStep {
        self.step
    }

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn cart_snapshot(&self) -> &[CartItem] {
        &self.cart_snapshot
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn payment(&self) -> Option<&PaymentSelection> {
        self.payment.as_ref()
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    pub fn placed_order(&self) -> Option<&OrderId> {
        self.placed_order.as_ref()
    }

    pub fn subtotal(&self) -> Money {
        subtotal_of(&self.cart_snapshot)
    }

    /// Whether the forward action of the current step is enabled.
    pub fn can_advance(&self) -> bool {
        match self.step {
            CheckoutStep::Login => self.customer.is_some(),
            CheckoutStep::Address => self.address.is_some(),
            CheckoutStep::Payment => self.payment.is_some(),
            CheckoutStep::Review => false,
        }
    }

    /// Whether the indicator for `target` is clickable.
    pub fn can_go_to(&self, target: CheckoutStep) -> bool {
        target < self.step
    }

    pub fn step_statuses(&self) -> [(CheckoutStep, StepStatus); 4] {
        CheckoutStep::ALL.map(|step| (step, step.status_relative_to(self.step)))
    }

    /// Everything an order needs is in place.
    pub fn is_ready_to_place(&self) -> bool {
        self.created
            && self.placed_order.is_none()
            && self.step == CheckoutStep::Review
            && self.address.is_some()
            && self.payment.is_some()
            && !self.cart_snapshot.is_empty()
    }

    /// Price the snapshot with the current payment method and discount.
    pub fn quote(&self, policy: &PricingPolicy) -> PriceBreakdown {
        policy.quote_items(
            &self.cart_snapshot,
            self.payment.as_ref().map(PaymentSelection::method),
            self.discount,
        )
    }
}

impl AggregateRoot for CheckoutSession {
    type Id = SessionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: StartCheckout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCheckout {
    pub session_id: SessionId,
    /// Set when a customer is already signed in; checkout then skips Login.
    pub customer: Option<Customer>,
    pub items: Vec<CartItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EstablishCustomer (sign-in completed or guest chosen).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishCustomer {
    pub session_id: SessionId,
    pub customer: Customer,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SelectAddress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectAddress {
    pub session_id: SessionId,
    pub address: Address,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SelectPayment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectPayment {
    pub session_id: SessionId,
    pub payment: PaymentSelection,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyCoupon (discount already validated externally).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyCoupon {
    pub session_id: SessionId,
    pub code: String,
    pub discount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveCoupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveCoupon {
    pub session_id: SessionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Advance to the next step, if the current step's guard holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    pub session_id: SessionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: GoToStep (backward navigation via a completed step indicator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoToStep {
    pub session_id: SessionId,
    pub target: CheckoutStep,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RefreshCart (the cart changed while checking out).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCart {
    pub session_id: SessionId,
    pub items: Vec<CartItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordOrderPlaced (the Order API accepted the order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOrderPlaced {
    pub session_id: SessionId,
    pub order_id: OrderId,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutCommand {
    StartCheckout(StartCheckout),
    EstablishCustomer(EstablishCustomer),
    SelectAddress(SelectAddress),
    SelectPayment(SelectPayment),
    ApplyCoupon(ApplyCoupon),
    RemoveCoupon(RemoveCoupon),
    Advance(Advance),
    GoToStep(GoToStep),
    RefreshCart(RefreshCart),
    RecordOrderPlaced(RecordOrderPlaced),
}

/// Event: CheckoutStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutStarted {
    pub session_id: SessionId,
    pub customer: Option<Customer>,
    pub items: Vec<CartItem>,
    pub initial_step: CheckoutStep,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustomerEstablished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerEstablished {
    pub session_id: SessionId,
    pub customer: Customer,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AddressSelected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressSelected {
    pub session_id: SessionId,
    pub address: Address,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentSelected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSelected {
    pub session_id: SessionId,
    pub payment: PaymentSelection,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CouponApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponApplied {
    pub session_id: SessionId,
    pub code: String,
    pub discount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CouponRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponRemoved {
    pub session_id: SessionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StepChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepChanged {
    pub session_id: SessionId,
    pub from: CheckoutStep,
    pub to: CheckoutStep,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CartRefreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartRefreshed {
    pub session_id: SessionId,
    pub items: Vec<CartItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPlaced {
    pub session_id: SessionId,
    pub order_id: OrderId,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckoutEvent {
    CheckoutStarted(CheckoutStarted),
    CustomerEstablished(CustomerEstablished),
    AddressSelected(AddressSelected),
    PaymentSelected(PaymentSelected),
    CouponApplied(CouponApplied),
    CouponRemoved(CouponRemoved),
    StepChanged(StepChanged),
    CartRefreshed(CartRefreshed),
    OrderPlaced(OrderPlaced),
}

impl Event for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutStarted(_) => "checkout.started",
            CheckoutEvent::CustomerEstablished(_) => "checkout.customer_established",
            CheckoutEvent::AddressSelected(_) => "checkout.address_selected",
            CheckoutEvent::PaymentSelected(_) => "checkout.payment_selected",
            CheckoutEvent::CouponApplied(_) => "checkout.coupon_applied",
            CheckoutEvent::CouponRemoved(_) => "checkout.coupon_removed",
            CheckoutEvent::StepChanged(_) => "checkout.step_changed",
            CheckoutEvent::CartRefreshed(_) => "checkout.cart_refreshed",
            CheckoutEvent::OrderPlaced(_) => "checkout.order_placed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CheckoutEvent::CheckoutStarted(e) => e.occurred_at,
            CheckoutEvent::CustomerEstablished(e) => e.occurred_at,
            CheckoutEvent::AddressSelected(e) => e.occurred_at,
            CheckoutEvent::PaymentSelected(e) => e.occurred_at,
            CheckoutEvent::CouponApplied(e) => e.occurred_at,
            CheckoutEvent::CouponRemoved(e) => e.occurred_at,
            CheckoutEvent::StepChanged(e) => e.occurred_at,
            CheckoutEvent::CartRefreshed(e) => e.occurred_at,
            CheckoutEvent::OrderPlaced(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CheckoutSession {
    type Command = CheckoutCommand;
    type Event = CheckoutEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CheckoutEvent::CheckoutStarted(e) => {
                self.id = e.session_id;
                self.step = e.initial_step;
                self.customer = e.customer.clone();
                self.cart_snapshot = e.items.clone();
                self.address = None;
                self.payment = None;
                self.coupon_code = None;
                self.discount = 0;
                self.placed_order = None;
                self.created = true;
            }
            CheckoutEvent::CustomerEstablished(e) => {
                self.customer = Some(e.customer.clone());
            }
            CheckoutEvent::AddressSelected(e) => {
                self.address = Some(e.address.clone());
            }
            CheckoutEvent::PaymentSelected(e) => {
                self.payment = Some(e.payment.clone());
            }
            CheckoutEvent::CouponApplied(e) => {
                self.coupon_code = Some(e.code.clone());
                self.discount = e.discount;
            }
            CheckoutEvent::CouponRemoved(_) => {
                self.coupon_code = None;
                self.discount = 0;
            }
            CheckoutEvent::StepChanged(e) => {
                self.step = e.to;
            }
            CheckoutEvent::CartRefreshed(e) => {
                self.cart_snapshot = e.items.clone();
            }
            CheckoutEvent::OrderPlaced(e) => {
                self.placed_order = Some(e.order_id.clone());
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CheckoutCommand::StartCheckout(cmd) => self.handle_start(cmd),
            CheckoutCommand::EstablishCustomer(cmd) => self.handle_establish_customer(cmd),
            CheckoutCommand::SelectAddress(cmd) => self.handle_select_address(cmd),
            CheckoutCommand::SelectPayment(cmd) => self.handle_select_payment(cmd),
            CheckoutCommand::ApplyCoupon(cmd) => self.handle_apply_coupon(cmd),
            CheckoutCommand::RemoveCoupon(cmd) => self.handle_remove_coupon(cmd),
            CheckoutCommand::Advance(cmd) => self.handle_advance(cmd),
            CheckoutCommand::GoToStep(cmd) => self.handle_go_to_step(cmd),
            CheckoutCommand::RefreshCart(cmd) => self.handle_refresh_cart(cmd),
            CheckoutCommand::RecordOrderPlaced(cmd) => self.handle_record_order_placed(cmd),
        }
    }
}

impl CheckoutSession {
    /// Common preconditions for every command after StartCheckout.
    fn ensure_open(&self, session_id: SessionId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != session_id {
            return Err(DomainError::invariant("session_id mismatch"));
        }
        if self.placed_order.is_some() {
            return Err(DomainError::invariant("checkout already completed"));
        }
        Ok(())
    }

    fn ensure_step(&self, expected: CheckoutStep, what: &str) -> Result<(), DomainError> {
        if self.step != expected {
            return Err(DomainError::validation(format!(
                "{what} can only be chosen at the {} step",
                expected.label()
            )));
        }
        Ok(())
    }

    fn handle_start(&self, cmd: &StartCheckout) -> Result<Vec<CheckoutEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("checkout session already started"));
        }

        if cmd.items.is_empty() {
            return Err(DomainError::validation("cannot start checkout with an empty cart"));
        }

        let initial_step = if cmd.customer.is_some() {
            CheckoutStep::Address
        } else {
            CheckoutStep::Login
        };

        Ok(vec![CheckoutEvent::CheckoutStarted(CheckoutStarted {
            session_id: cmd.session_id,
            customer: cmd.customer.clone(),
            items: cmd.items.clone(),
            initial_step,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_establish_customer(
        &self,
        cmd: &EstablishCustomer,
    ) -> Result<Vec<CheckoutEvent>, DomainError> {
        self.ensure_open(cmd.session_id)?;

        if self.customer.as_ref() == Some(&cmd.customer) {
            return Ok(vec![]);
        }
        self.ensure_step(CheckoutStep::Login, "customer")?;

        Ok(vec![CheckoutEvent::CustomerEstablished(CustomerEstablished {
            session_id: cmd.session_id,
            customer: cmd.customer.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_select_address(
        &self,
        cmd: &SelectAddress,
    ) -> Result<Vec<CheckoutEvent>, DomainError> {
        self.ensure_open(cmd.session_id)?;
        self.ensure_step(CheckoutStep::Address, "address")?;

        Ok(vec![CheckoutEvent::AddressSelected(AddressSelected {
            session_id: cmd.session_id,
            address: cmd.address.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_select_payment(
        &self,
        cmd: &SelectPayment,
    ) -> Result<Vec<CheckoutEvent>, DomainError> {
        self.ensure_open(cmd.session_id)?;
        self.ensure_step(CheckoutStep::Payment, "payment")?;

        Ok(vec![CheckoutEvent::PaymentSelected(PaymentSelected {
            session_id: cmd.session_id,
            payment: cmd.payment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_coupon(&self, cmd: &ApplyCoupon) -> Result<Vec<CheckoutEvent>, DomainError> {
        self.ensure_open(cmd.session_id)?;

        let code = normalize_code(&cmd.code);
        if code.is_empty() {
            return Err(DomainError::validation("coupon code must not be empty"));
        }

        Ok(vec![CheckoutEvent::CouponApplied(CouponApplied {
            session_id: cmd.session_id,
            code,
            discount: cmd.discount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_coupon(&self, cmd: &RemoveCoupon) -> Result<Vec<CheckoutEvent>, DomainError> {
        self.ensure_open(cmd.session_id)?;

        if self.coupon_code.is_none() {
            return Ok(vec![]);
        }

        Ok(vec![CheckoutEvent::CouponRemoved(CouponRemoved {
            session_id: cmd.session_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_advance(&self, cmd: &Advance) -> Result<Vec<CheckoutEvent>, DomainError> {
        self.ensure_open(cmd.session_id)?;

        // Unmet guard: inert, nothing decided.
        if !self.can_advance() {
            return Ok(vec![]);
        }
        let Some(to) = self.step.next() else {
            return Ok(vec![]);
        };

        Ok(vec![CheckoutEvent::StepChanged(StepChanged {
            session_id: cmd.session_id,
            from: self.step,
            to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_go_to_step(&self, cmd: &GoToStep) -> Result<Vec<CheckoutEvent>, DomainError> {
        self.ensure_open(cmd.session_id)?;

        if !self.can_go_to(cmd.target) {
            return Ok(vec![]);
        }

        Ok(vec![CheckoutEvent::StepChanged(StepChanged {
            session_id: cmd.session_id,
            from: self.step,
            to: cmd.target,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refresh_cart(&self, cmd: &RefreshCart) -> Result<Vec<CheckoutEvent>, DomainError> {
        self.ensure_open(cmd.session_id)?;

        if cmd.items.is_empty() {
            return Err(DomainError::invariant("checkout cannot continue with an empty cart"));
        }
        if cmd.items == self.cart_snapshot {
            return Ok(vec![]);
        }

        Ok(vec![CheckoutEvent::CartRefreshed(CartRefreshed {
            session_id: cmd.session_id,
            items: cmd.items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_order_placed(
        &self,
        cmd: &RecordOrderPlaced,
    ) -> Result<Vec<CheckoutEvent>, DomainError> {
        self.ensure_open(cmd.session_id)?;

        if !self.is_ready_to_place() {
            return Err(DomainError::invariant(
                "order can only be placed from a complete review step",
            ));
        }

        Ok(vec![CheckoutEvent::OrderPlaced(OrderPlaced {
            session_id: cmd.session_id,
            order_id: cmd.order_id.clone(),
            total: cmd.total,
            occurred_at: cmd.occurred_at,
        })])
    }
}

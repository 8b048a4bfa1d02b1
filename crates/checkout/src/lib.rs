//! Checkout domain module.
//!
//! A linear checkout (Login → Address → Payment → Review) modelled as an
//! event-sourced aggregate, plus the application-level [`CheckoutFlow`] that
//! wires it to the cart, the pricing calculator and the Order API.

pub mod address;
pub mod customer;
pub mod delivery;
pub mod error;
pub mod flow;
pub mod order;
pub mod payment;
pub mod session;
pub mod step;

pub use address::{Address, AddressBook, AddressErrors, AddressInput, AddressType, FieldError};
pub use customer::{Anonymous, Customer, IdentityProvider, StaticIdentity};
pub use delivery::{DeliveryEstimate, DeliveryTable, PincodeEntry};
pub use error::CheckoutError;
pub use flow::{CheckoutEventEnvelope, CheckoutFlow, FlowStatus};
pub use order::{OrderApi, OrderApiError, OrderConfirmation, OrderDraft, OrderLine, PlaceOrderRequest};
pub use payment::{PaymentDetails, PaymentError, PaymentInput, PaymentSelection};
pub use session::{CheckoutCommand, CheckoutEvent, CheckoutSession};
pub use step::{CheckoutStep, StepStatus};

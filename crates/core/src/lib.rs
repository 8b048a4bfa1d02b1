//! `bookstore-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no IO, no HTTP, no UI).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod payment;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{BookId, IdempotencyKey, OrderId, SessionId};
pub use money::{Money, format_money};
pub use payment::PaymentMethod;
pub use value_object::ValueObject;

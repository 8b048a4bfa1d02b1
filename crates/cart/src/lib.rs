//! Shopping cart domain module.
//!
//! The cart is a collaborator of checkout: checkout reads its lines and totals,
//! and clears it exactly once when an order is placed. Everything here is
//! synchronous, deterministic, in-memory state.

pub mod in_memory;
pub mod item;
pub mod store;

pub use in_memory::InMemoryCart;
pub use item::CartItem;
pub use store::{CartStore, HydrationState, subtotal_of};

use bookstore_core::{BookId, DomainResult, Money};

use crate::item::CartItem;

/// Whether the cart has finished loading its persisted contents.
///
/// A cart restored from client storage starts out `Hydrating`; until it is
/// `Ready`, "empty" means "not known yet", not "nothing to buy".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationState {
    Hydrating,
    Ready,
}

/// Cart contract as seen by checkout.
///
/// Checkout is read-mostly: it snapshots `items()`, prices them, and calls
/// `clear()` once after a successful order.
pub trait CartStore {
    fn hydration(&self) -> HydrationState;

    /// Lines in insertion order.
    fn items(&self) -> &[CartItem];

    /// Remove a line entirely, returning it if it was present.
    fn remove_item(&mut self, id: &BookId) -> Option<CartItem>;

    /// Set a line's quantity. A quantity of 0 removes the line.
    fn update_quantity(&mut self, id: &BookId, quantity: u32) -> DomainResult<()>;

    fn clear(&mut self);

    /// Sum of `unit_price × quantity` over all lines.
    fn total_price(&self) -> Money {
        subtotal_of(self.items())
    }

    /// Number of copies in the cart (sum of quantities).
    fn item_count(&self) -> u32 {
        self.items()
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity()))
    }

    fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    fn is_ready(&self) -> bool {
        self.hydration() == HydrationState::Ready
    }
}

impl<T: CartStore + ?Sized> CartStore for &mut T {
    fn hydration(&self) -> HydrationState {
        (**self).hydration()
    }

    fn items(&self) -> &[CartItem] {
        (**self).items()
    }

    fn remove_item(&mut self, id: &BookId) -> Option<CartItem> {
        (**self).remove_item(id)
    }

    fn update_quantity(&mut self, id: &BookId, quantity: u32) -> DomainResult<()> {
        (**self).update_quantity(id, quantity)
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}

/// Subtotal of a set of lines, in minor units.
pub fn subtotal_of(items: &[CartItem]) -> Money {
    items
        .iter()
        .fold(0u64, |acc, item| acc.saturating_add(item.line_total()))
}

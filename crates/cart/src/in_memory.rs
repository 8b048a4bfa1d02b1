//! In-memory cart (the storefront's client-side cart).

use bookstore_core::{BookId, DomainError, DomainResult, Entity};

use crate::item::CartItem;
use crate::store::{CartStore, HydrationState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryCart {
    items: Vec<CartItem>,
    hydration: HydrationState,
}

impl InMemoryCart {
    /// An empty cart that is already usable.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            hydration: HydrationState::Ready,
        }
    }

    /// A cart still waiting for its persisted contents.
    pub fn hydrating() -> Self {
        Self {
            items: Vec::new(),
            hydration: HydrationState::Hydrating,
        }
    }

    /// Finish hydration with the restored lines. Lines for the same book are merged.
    pub fn hydrate(&mut self, items: impl IntoIterator<Item = CartItem>) {
        self.items.clear();
        for item in items {
            self.merge(item);
        }
        self.hydration = HydrationState::Ready;
        tracing::debug!(lines = self.items.len(), "cart hydrated");
    }

    /// Add a line; adding a book already in the cart increases its quantity.
    pub fn add_item(&mut self, item: CartItem) {
        self.merge(item);
    }

    fn merge(&mut self, item: CartItem) {
        match self.items.iter_mut().find(|line| line.id() == item.id()) {
            Some(line) => {
                let quantity = line.quantity().saturating_add(item.quantity());
                line.set_quantity(quantity);
            }
            None => self.items.push(item),
        }
    }
}

impl Default for InMemoryCart {
    fn default() -> Self {
        Self::new()
    }
}

impl CartStore for InMemoryCart {
    fn hydration(&self) -> HydrationState {
        self.hydration
    }

    fn items(&self) -> &[CartItem] {
        &self.items
    }

    fn remove_item(&mut self, id: &BookId) -> Option<CartItem> {
        let index = self.items.iter().position(|line| line.id() == id)?;
        Some(self.items.remove(index))
    }

    fn update_quantity(&mut self, id: &BookId, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return self
                .remove_item(id)
                .map(|_| ())
                .ok_or_else(DomainError::not_found);
        }

        let line = self
            .items
            .iter_mut()
            .find(|line| line.id() == id)
            .ok_or_else(DomainError::not_found)?;
        line.set_quantity(quantity);
        Ok(())
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_item(id: &str, unit_price: u64, quantity: u32) -> CartItem {
        CartItem::new(BookId::new(id).unwrap(), format!("Title {id}"), "Author", unit_price, quantity)
            .unwrap()
    }

    #[test]
    fn adding_same_book_merges_quantities() {
        let mut cart = InMemoryCart::new();
        cart.add_item(test_item("b-1", 15_000, 1));
        cart.add_item(test_item("b-1", 15_000, 2));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total_price(), 45_000);
    }

    #[test]
    fn updating_quantity_to_zero_removes_the_line() {
        let mut cart = InMemoryCart::new();
        cart.add_item(test_item("b-1", 15_000, 2));
        cart.add_item(test_item("b-2", 20_000, 1));

        cart.update_quantity(&BookId::new("b-1").unwrap(), 0).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].book_id().as_str(), "b-2");
    }

    #[test]
    fn updating_unknown_line_is_not_found() {
        let mut cart = InMemoryCart::new();
        let err = cart.update_quantity(&BookId::new("missing").unwrap(), 2).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn hydrating_cart_becomes_ready_after_hydrate() {
        let mut cart = InMemoryCart::hydrating();
        assert!(!cart.is_ready());

        cart.hydrate(vec![test_item("b-1", 15_000, 1), test_item("b-2", 20_000, 1)]);

        assert!(cart.is_ready());
        assert_eq!(cart.total_price(), 35_000);
    }

    #[test]
    fn clear_empties_the_cart() {
        let mut cart = InMemoryCart::new();
        cart.add_item(test_item("b-1", 15_000, 1));
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_price(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8, u32),
        Update(u8, u32),
        Remove(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..5, 1u32..5).prop_map(|(id, qty)| Op::Add(id, qty)),
            (0u8..5, 0u32..5).prop_map(|(id, qty)| Op::Update(id, qty)),
            (0u8..5).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: no sequence of operations leaves a zero-quantity or duplicate line.
        #[test]
        fn lines_stay_unique_and_positive(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let mut cart = InMemoryCart::new();
            for op in ops {
                match op {
                    Op::Add(id, qty) => cart.add_item(test_item(&format!("b-{id}"), 1_000, qty)),
                    Op::Update(id, qty) => {
                        let _ = cart.update_quantity(&BookId::new(format!("b-{id}")).unwrap(), qty);
                    }
                    Op::Remove(id) => {
                        cart.remove_item(&BookId::new(format!("b-{id}")).unwrap());
                    }
                }
            }

            let mut ids: Vec<_> = cart.items().iter().map(|line| line.book_id().clone()).collect();
            let before = ids.len();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), before);
            prop_assert!(cart.items().iter().all(|line| line.quantity() >= 1));
            prop_assert_eq!(cart.total_price(), u64::from(cart.item_count()) * 1_000);
        }
    }
}

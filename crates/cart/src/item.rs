use serde::{Deserialize, Serialize};

use bookstore_core::{BookId, DomainError, DomainResult, Entity, Money};

/// One cart line: a book and how many copies of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    id: BookId,
    title: String,
    author: String,
    /// Price in smallest currency unit.
    unit_price: Money,
    quantity: u32,
    image_ref: Option<String>,
}

impl CartItem {
    pub fn new(
        id: BookId,
        title: impl Into<String>,
        author: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }

        Ok(Self {
            id,
            title: title.into(),
            author: author.into(),
            unit_price,
            quantity,
            image_ref: None,
        })
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn book_id(&self) -> &BookId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    /// `unit_price × quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }

    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        debug_assert!(quantity >= 1);
        self.quantity = quantity;
    }
}

impl Entity for CartItem {
    type Id = BookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

//! Cart lines and merge semantics.
//!
//! The cart only records *what* the shopper wants (product, options,
//! quantity). Prices are never stored here: they are derived from the
//! catalog through [`crate::pricing`] each time the cart is shown or checked
//! out.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ProductId, SelectedOptions};

/// Highest quantity a single line can hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Highest number of distinct lines in a cart (payment provider limit).
pub const MAX_LINES: usize = 100;

/// Errors returned by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be between 1 and {max} (got {0})", max = MAX_LINE_QUANTITY)]
    InvalidQuantity(u32),
    #[error("cart line {0} does not exist")]
    LineNotFound(usize),
    #[error("cart cannot hold more than {max} lines", max = MAX_LINES)]
    TooManyLines,
}

/// One product entry in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub selected_options: SelectedOptions,
}

impl CartLine {
    /// Create a line.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: u32, selected_options: SelectedOptions) -> Self {
        Self {
            product_id,
            quantity,
            selected_options,
        }
    }

    /// Two lines merge when product and selected options are structurally
    /// equal. Quantity is not part of the identity.
    #[must_use]
    pub fn same_item(&self, other: &Self) -> bool {
        self.product_id == other.product_id && self.selected_options == other.selected_options
    }

    /// Check the quantity bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] outside `1..=99`.
    pub const fn validate(&self) -> Result<(), CartError> {
        validate_quantity(self.quantity)
    }
}

/// A shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of quantities across lines (the badge count).
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Add a line, merging with an existing equal line.
    ///
    /// A merge increments the existing quantity, capped at
    /// [`MAX_LINE_QUANTITY`]. Returns the index of the affected line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a quantity outside
    /// `1..=99`, or [`CartError::TooManyLines`] if a new line would exceed
    /// [`MAX_LINES`].
    pub fn add(&mut self, line: CartLine) -> Result<usize, CartError> {
        line.validate()?;

        if let Some(index) = self.lines.iter().position(|l| l.same_item(&line)) {
            if let Some(existing) = self.lines.get_mut(index) {
                existing.quantity = existing
                    .quantity
                    .saturating_add(line.quantity)
                    .min(MAX_LINE_QUANTITY);
            }
            return Ok(index);
        }

        if self.lines.len() >= MAX_LINES {
            return Err(CartError::TooManyLines);
        }
        self.lines.push(line);
        Ok(self.lines.len() - 1)
    }

    /// Set the quantity of a line. A quantity of zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] for a bad index, or
    /// [`CartError::InvalidQuantity`] above [`MAX_LINE_QUANTITY`].
    pub fn set_quantity(&mut self, index: usize, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(index).map(|_| ());
        }
        validate_quantity(quantity)?;
        let line = self
            .lines
            .get_mut(index)
            .ok_or(CartError::LineNotFound(index))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove and return a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] for a bad index.
    pub fn remove(&mut self, index: usize) -> Result<CartLine, CartError> {
        if index >= self.lines.len() {
            return Err(CartError::LineNotFound(index));
        }
        Ok(self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Drop lines whose product no longer exists.
    pub fn retain_products(&mut self, mut keep: impl FnMut(ProductId) -> bool) {
        self.lines.retain(|l| keep(l.product_id));
    }
}

const fn validate_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 || quantity > MAX_LINE_QUANTITY {
        return Err(CartError::InvalidQuantity(quantity));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn line(product: i64, quantity: u32, length: Option<&str>) -> CartLine {
        let mut options = SelectedOptions::new();
        if let Some(length) = length {
            options.insert("Length", length);
        }
        CartLine::new(ProductId::new(product), quantity, options)
    }

    #[test]
    fn test_add_identical_line_merges_quantity() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, 1, Some("45-50cm"))).unwrap(), 0);
        assert_eq!(cart.add(line(1, 2, Some("45-50cm"))).unwrap(), 0);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn test_add_different_options_creates_new_line() {
        let mut cart = Cart::new();
        cart.add(line(1, 1, Some("40-45cm"))).unwrap();
        cart.add(line(1, 1, Some("45-50cm"))).unwrap();
        cart.add(line(1, 1, None)).unwrap();
        cart.add(line(2, 1, Some("40-45cm"))).unwrap();
        assert_eq!(cart.lines().len(), 4);
        assert_eq!(cart.total_quantity(), 4);
    }

    #[test]
    fn test_merge_caps_at_max_quantity() {
        let mut cart = Cart::new();
        cart.add(line(1, 90, None)).unwrap();
        cart.add(line(1, 20, None)).unwrap();
        assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_add_rejects_invalid_quantity() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, 0, None)), Err(CartError::InvalidQuantity(0)));
        assert_eq!(cart.add(line(1, 100, None)), Err(CartError::InvalidQuantity(100)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_too_many_lines() {
        let mut cart = Cart::new();
        for i in 0..MAX_LINES {
            cart.add(line(i64::try_from(i).unwrap() + 1, 1, None)).unwrap();
        }
        assert_eq!(cart.add(line(10_000, 1, None)), Err(CartError::TooManyLines));
        // Merging into an existing line still works when full.
        assert!(cart.add(line(1, 1, None)).is_ok());
    }

    #[test]
    fn test_set_quantity_and_remove() {
        let mut cart = Cart::new();
        cart.add(line(1, 1, None)).unwrap();
        cart.add(line(2, 1, None)).unwrap();

        cart.set_quantity(1, 5).unwrap();
        assert_eq!(cart.lines()[1].quantity, 5);

        cart.set_quantity(0, 0).unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].product_id, ProductId::new(2));

        assert_eq!(cart.set_quantity(3, 1), Err(CartError::LineNotFound(3)));
        assert_eq!(cart.remove(7), Err(CartError::LineNotFound(7)));

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn test_retain_products() {
        let mut cart = Cart::new();
        cart.add(line(1, 1, None)).unwrap();
        cart.add(line(2, 1, None)).unwrap();
        cart.retain_products(|id| id != ProductId::new(1));
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_cart_serde_roundtrip_preserves_lines() {
        let mut cart = Cart::new();
        cart.add(line(3, 2, Some("45-50cm"))).unwrap();
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json["lines"][0]["selectedOptions"]["Length"], "45-50cm");
        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}

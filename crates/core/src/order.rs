//! Order snapshots and totals.
//!
//! An order is a frozen copy of what was bought and what was charged. Item
//! prices are captured at purchase time and never re-read from the catalog.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing;
use crate::types::{CurrencyCode, ProductId, SelectedOptions};

/// A postal address as collected by the hosted checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: Option<String>,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub phone: Option<String>,
}

impl Address {
    /// Single-line rendering for emails and logs.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            self.name.as_deref(),
            Some(self.line1.as_str()),
            self.line2.as_deref(),
            Some(self.city.as_str()),
            self.state.as_deref(),
            Some(self.postal_code.as_str()),
            Some(self.country.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Snapshot of one purchased line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Catalog product, if the line could be traced back to one.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub selected_options: SelectedOptions,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl OrderItem {
    /// Build a snapshot; the line total is derived from unit price and
    /// quantity.
    #[must_use]
    pub fn new(
        product_id: Option<ProductId>,
        name: String,
        image: Option<String>,
        quantity: u32,
        selected_options: SelectedOptions,
        unit_price: Decimal,
    ) -> Self {
        Self {
            product_id,
            name,
            image,
            quantity,
            selected_options,
            unit_price,
            line_total: pricing::line_total(unit_price, quantity),
        }
    }
}

/// Monetary totals of an order.
///
/// `total` is always `subtotal + shipping_cost + tax`; it is computed here
/// and never accepted from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Compute totals from their components.
    #[must_use]
    pub fn new(currency: CurrencyCode, subtotal: Decimal, shipping_cost: Decimal, tax: Decimal) -> Self {
        Self {
            currency,
            subtotal,
            shipping_cost,
            tax,
            total: subtotal + shipping_cost + tax,
        }
    }

    /// Compute totals from the payment provider's integer minor units.
    #[must_use]
    pub fn from_minor_units(
        currency: CurrencyCode,
        subtotal: i64,
        shipping_cost: i64,
        tax: i64,
    ) -> Self {
        Self::new(
            currency,
            currency.from_minor_units(subtotal),
            currency.from_minor_units(shipping_cost),
            currency.from_minor_units(tax),
        )
    }

    /// Whether `total` equals the sum of its parts (holds for every value
    /// built through this type; checked again on rows read from storage).
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal + self.shipping_cost + self.tax
    }
}

/// Sum of item line totals.
#[must_use]
pub fn items_subtotal(items: &[OrderItem]) -> Decimal {
    items.iter().map(|i| i.line_total).sum()
}

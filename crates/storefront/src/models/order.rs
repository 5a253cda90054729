//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lunaria_core::{Address, OrderId, OrderItem, OrderStatus, OrderTotals, PaymentStatus, UserId};

/// Payment provider references for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    /// Checkout session id; unique across orders.
    pub session_id: String,
    pub payment_intent_id: Option<String>,
    pub status: PaymentStatus,
}

/// An order materialized from a checkout session, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub payment: PaymentInfo,
    pub totals: OrderTotals,
    pub status: OrderStatus,
    pub guest_checkout: bool,
}

/// A stored order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub payment: PaymentInfo,
    pub totals: OrderTotals,
    pub status: OrderStatus,
    pub guest_checkout: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Total number of units across items.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

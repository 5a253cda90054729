//! Order repository.
//!
//! Orders are written once by the webhook consumer and only their payment
//! and fulfillment status changes afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use lunaria_core::{
    Address, CurrencyCode, OrderId, OrderItem, OrderStatus, OrderTotals, PaymentStatus, UserId,
};

use super::RepositoryError;
use crate::models::{NewOrder, Order, PaymentInfo};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: Option<i64>,
    customer_email: Option<String>,
    customer_name: Option<String>,
    items: Json<Vec<OrderItem>>,
    shipping_address: Option<Json<Address>>,
    billing_address: Option<Json<Address>>,
    stripe_session_id: String,
    stripe_payment_intent_id: Option<String>,
    payment_status: String,
    currency: String,
    subtotal: Decimal,
    shipping_cost: Decimal,
    tax: Decimal,
    total: Decimal,
    status: String,
    guest_checkout: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let currency = row
            .currency
            .parse::<CurrencyCode>()
            .map_err(|e| RepositoryError::corrupt("currency", e))?;
        let totals = OrderTotals {
            currency,
            subtotal: row.subtotal,
            shipping_cost: row.shipping_cost,
            tax: row.tax,
            total: row.total,
        };
        if !totals.is_consistent() {
            return Err(RepositoryError::DataCorruption(format!(
                "order {} total does not match its components",
                row.id
            )));
        }

        Ok(Self {
            id: OrderId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            customer_email: row.customer_email,
            customer_name: row.customer_name,
            items: row.items.0,
            shipping_address: row.shipping_address.map(|a| a.0),
            billing_address: row.billing_address.map(|a| a.0),
            payment: PaymentInfo {
                session_id: row.stripe_session_id,
                payment_intent_id: row.stripe_payment_intent_id,
                status: row
                    .payment_status
                    .parse::<PaymentStatus>()
                    .map_err(|e| RepositoryError::corrupt("payment status", e))?,
            },
            totals,
            status: row
                .status
                .parse::<OrderStatus>()
                .map_err(|e| RepositoryError::corrupt("order status", e))?,
            guest_checkout: row.guest_checkout,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, customer_email, customer_name, items, shipping_address, billing_address, \
     stripe_session_id, stripe_payment_intent_id, payment_status, currency, subtotal, shipping_cost, tax, total, \
     status, guest_checkout, created_at, updated_at";

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up the order created for a checkout session.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_session_id(&self, session_id: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE stripe_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// ID of the order created for a checkout session, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_id_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM orders WHERE stripe_session_id = $1")
                .bind(session_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(id.map(OrderId::new))
    }

    /// Insert an order unless one already exists for its checkout session.
    ///
    /// Returns the new order's ID, or `None` when the session was already
    /// materialized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_if_absent(&self, order: &NewOrder) -> Result<Option<OrderId>, RepositoryError> {
        let id: Option<i64> = sqlx::query_scalar(
            r"
            INSERT INTO orders (
                user_id, customer_email, customer_name, items, shipping_address, billing_address,
                stripe_session_id, stripe_payment_intent_id, payment_status,
                currency, subtotal, shipping_cost, tax, total, status, guest_checkout
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (stripe_session_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(order.user_id.map(|id| id.as_i64()))
        .bind(order.customer_email.as_deref())
        .bind(order.customer_name.as_deref())
        .bind(Json(&order.items))
        .bind(order.shipping_address.as_ref().map(Json))
        .bind(order.billing_address.as_ref().map(Json))
        .bind(&order.payment.session_id)
        .bind(order.payment.payment_intent_id.as_deref())
        .bind(order.payment.status.as_str())
        .bind(order.totals.currency.code())
        .bind(order.totals.subtotal)
        .bind(order.totals.shipping_cost)
        .bind(order.totals.tax)
        .bind(order.totals.total)
        .bind(order.status.as_str())
        .bind(order.guest_checkout)
        .fetch_optional(self.pool)
        .await?;

        Ok(id.map(OrderId::new))
    }

    /// Record a delayed payment outcome on a pending order.
    ///
    /// Only orders still `pending` are touched, so a replayed event is a
    /// no-op. Returns the updated order's ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_payment_status(
        &self,
        session_id: &str,
        payment_status: PaymentStatus,
        status: OrderStatus,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let id: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE orders
            SET payment_status = $2, status = $3, updated_at = NOW()
            WHERE stripe_session_id = $1 AND status = 'pending'
            RETURNING id
            ",
        )
        .bind(session_id)
        .bind(payment_status.as_str())
        .bind(status.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(id.map(OrderId::new))
    }

    /// Orders placed by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// A single order, only if it belongs to the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        id: OrderId,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id.as_i64())
        .bind(user_id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }
}

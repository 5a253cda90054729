//! Webhook consumer: turns confirmed checkout sessions into orders.
//!
//! A delivery moves through
//! `Received -> SignatureVerified -> SessionRetrieved -> OrderCreated`.
//! The event body is only trusted for its type and session ID; the order
//! is always built from the session as re-fetched from Stripe.
//!
//! Deliveries are idempotent. An existing order for the session is
//! returned as-is, and the insert itself is conditional on the session ID,
//! so concurrent redeliveries still produce a single order.

use std::fmt;
use std::future::Future;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{Span, info, instrument, warn};

use lunaria_core::{
    CurrencyCode, OrderId, OrderItem, OrderStatus, OrderTotals, PaymentStatus, ProductId,
    SelectedOptions, UserId,
};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::{NewOrder, PaymentInfo};
use crate::services::checkout::metadata;
use crate::stripe::webhook::{self as signature, SignatureError};
use crate::stripe::{CheckoutSession, PaymentGateway, StripeError, StripeLineItem};

/// Event types acted upon.
pub mod events {
    pub const SESSION_COMPLETED: &str = "checkout.session.completed";
    pub const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";
    pub const ASYNC_PAYMENT_FAILED: &str = "checkout.session.async_payment_failed";
}

/// Persistence the consumer needs.
pub trait OrderStore: Send + Sync {
    /// ID of the order already created for a session.
    fn find_by_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<OrderId>, RepositoryError>> + Send;

    /// Insert unless the session already has an order. `None` means it did.
    fn insert_if_absent(
        &self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Option<OrderId>, RepositoryError>> + Send;

    /// Move a pending order to a new payment and order status.
    fn update_payment_status(
        &self,
        session_id: &str,
        payment_status: PaymentStatus,
        status: OrderStatus,
    ) -> impl Future<Output = Result<Option<OrderId>, RepositoryError>> + Send;
}

/// [`OrderStore`] backed by the `orders` table.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OrderStore for PgOrderStore {
    async fn find_by_session(&self, session_id: &str) -> Result<Option<OrderId>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .find_id_by_session_id(session_id)
            .await
    }

    async fn insert_if_absent(&self, order: &NewOrder) -> Result<Option<OrderId>, RepositoryError> {
        OrderRepository::new(&self.pool).insert_if_absent(order).await
    }

    async fn update_payment_status(
        &self,
        session_id: &str,
        payment_status: PaymentStatus,
        status: OrderStatus,
    ) -> Result<Option<OrderId>, RepositoryError> {
        OrderRepository::new(&self.pool)
            .update_payment_status(session_id, payment_status, status)
            .await
    }
}

/// Progress of a delivery through the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookState {
    Received,
    SignatureVerified,
    SessionRetrieved,
    OrderCreated,
}

impl WebhookState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::SignatureVerified => "signature_verified",
            Self::SessionRetrieved => "session_retrieved",
            Self::OrderCreated => "order_created",
        }
    }
}

impl fmt::Display for WebhookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session that cannot be turned into an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterializeError {
    #[error("session is missing {0}")]
    MissingField(&'static str),
    #[error("session currency '{0}' is not supported")]
    UnsupportedCurrency(String),
    #[error("session has no line items")]
    NoLineItems,
}

/// Why a delivery was rejected.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("signature verification failed: {0}")]
    Signature(#[from] SignatureError),

    #[error("invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("event has no session id")]
    MissingSessionId,

    #[error("failed to retrieve session: {0}")]
    Stripe(#[from] StripeError),

    #[error("cannot build order: {0}")]
    Materialize(#[from] MaterializeError),

    #[error("failed to store order: {0}")]
    Repository(#[from] RepositoryError),
}

impl WebhookError {
    /// Rejections before the signature was trusted are the sender's fault
    /// (400); everything after is ours (500, provider retries).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Signature(_) | Self::InvalidPayload(_))
    }
}

/// What a delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event type the storefront does not act on.
    Ignored { event_type: String },
    /// A new order was stored.
    OrderCreated { order_id: OrderId, order: Box<NewOrder> },
    /// The session already had an order; nothing changed.
    AlreadyProcessed { order_id: OrderId },
    /// A pending order's delayed payment settled or failed.
    PaymentUpdated { order_id: OrderId, status: OrderStatus },
}

impl WebhookOutcome {
    /// The order a confirmation email should go out for.
    ///
    /// Only newly created orders that are not cancelled qualify. An order
    /// created while its payment is still pending already gets a
    /// confirmation marked as awaiting payment, so a later settlement sends
    /// nothing.
    #[must_use]
    pub fn confirmation(self) -> Option<(OrderId, NewOrder)> {
        match self {
            Self::OrderCreated { order_id, order } if order.status != OrderStatus::Cancelled => {
                Some((order_id, *order))
            }
            _ => None,
        }
    }
}

/// Processes verified Stripe deliveries.
pub struct WebhookProcessor<'a, G, S> {
    gateway: &'a G,
    store: &'a S,
    signing_secret: &'a str,
    tolerance_secs: i64,
}

impl<'a, G, S> WebhookProcessor<'a, G, S>
where
    G: PaymentGateway,
    S: OrderStore,
{
    #[must_use]
    pub const fn new(gateway: &'a G, store: &'a S, signing_secret: &'a str) -> Self {
        Self {
            gateway,
            store,
            signing_secret,
            tolerance_secs: signature::DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Handle one delivery. `now` is the current unix time in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError`]; see [`WebhookError::is_client_error`] for
    /// the status mapping.
    #[instrument(
        skip_all,
        fields(state = %WebhookState::Received, event_id, event_type, session_id)
    )]
    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        now: i64,
    ) -> Result<WebhookOutcome, WebhookError> {
        let header = signature_header.ok_or(SignatureError::MissingHeader)?;
        signature::verify_signature(payload, header, self.signing_secret, now, self.tolerance_secs)?;
        advance(WebhookState::SignatureVerified);

        let event = signature::parse_event(payload)?;
        let span = Span::current();
        span.record("event_id", event.id.as_str());
        span.record("event_type", event.event_type.as_str());

        let session_id = match event.event_type.as_str() {
            events::SESSION_COMPLETED
            | events::ASYNC_PAYMENT_SUCCEEDED
            | events::ASYNC_PAYMENT_FAILED => event
                .object_id()
                .ok_or(WebhookError::MissingSessionId)?
                .to_string(),
            other => {
                info!(event_type = other, "Ignoring webhook event");
                return Ok(WebhookOutcome::Ignored {
                    event_type: other.to_string(),
                });
            }
        };
        span.record("session_id", session_id.as_str());

        match event.event_type.as_str() {
            events::ASYNC_PAYMENT_SUCCEEDED => {
                self.settle(&session_id, PaymentStatus::Paid, OrderStatus::Processing)
                    .await
            }
            events::ASYNC_PAYMENT_FAILED => {
                self.settle(&session_id, PaymentStatus::Unpaid, OrderStatus::Cancelled)
                    .await
            }
            _ => self.complete(&session_id, None).await,
        }
    }

    /// Create the order for a completed session unless one exists.
    async fn complete(
        &self,
        session_id: &str,
        status_override: Option<OrderStatus>,
    ) -> Result<WebhookOutcome, WebhookError> {
        if let Some(order_id) = self.store.find_by_session(session_id).await? {
            info!(%order_id, "Session already has an order");
            return Ok(WebhookOutcome::AlreadyProcessed { order_id });
        }

        let session = self.gateway.retrieve_checkout_session(session_id).await?;
        advance(WebhookState::SessionRetrieved);

        let mut order = materialize_order(&session)?;
        if let Some(status) = status_override {
            order.status = status;
        }

        if let Some(order_id) = self.store.insert_if_absent(&order).await? {
            advance(WebhookState::OrderCreated);
            info!(
                %order_id,
                total = %order.totals.total,
                guest = order.guest_checkout,
                "Order created from checkout session"
            );
            return Ok(WebhookOutcome::OrderCreated {
                order_id,
                order: Box::new(order),
            });
        }

        // Lost a race with a concurrent delivery of the same session.
        let order_id = self
            .store
            .find_by_session(session_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok(WebhookOutcome::AlreadyProcessed { order_id })
    }

    /// Apply a delayed payment outcome. If the completion event has not
    /// been processed yet, the order is created here in its final state.
    async fn settle(
        &self,
        session_id: &str,
        payment_status: PaymentStatus,
        status: OrderStatus,
    ) -> Result<WebhookOutcome, WebhookError> {
        if let Some(order_id) = self
            .store
            .update_payment_status(session_id, payment_status, status)
            .await?
        {
            info!(%order_id, %status, "Order payment status updated");
            return Ok(WebhookOutcome::PaymentUpdated { order_id, status });
        }

        if let Some(order_id) = self.store.find_by_session(session_id).await? {
            warn!(%order_id, %status, "Order is no longer pending, ignoring payment update");
            return Ok(WebhookOutcome::AlreadyProcessed { order_id });
        }

        let status_override = (status == OrderStatus::Cancelled).then_some(status);
        self.complete(session_id, status_override).await
    }
}

fn advance(state: WebhookState) {
    Span::current().record("state", state.as_str());
}

/// Build an order from a retrieved checkout session.
///
/// Totals come from the session's amounts (subtotal, shipping, tax) and the
/// total is recomputed from them.
///
/// # Errors
///
/// Returns [`MaterializeError`] if required session fields are missing.
pub fn materialize_order(session: &CheckoutSession) -> Result<NewOrder, MaterializeError> {
    let currency_code = session
        .currency
        .as_deref()
        .ok_or(MaterializeError::MissingField("currency"))?;
    let currency = currency_code
        .parse::<CurrencyCode>()
        .map_err(|_| MaterializeError::UnsupportedCurrency(currency_code.to_string()))?;

    let subtotal = session
        .amount_subtotal
        .ok_or(MaterializeError::MissingField("amount_subtotal"))?;
    let details = session.total_details.clone().unwrap_or_default();
    let shipping = session
        .shipping_cost
        .as_ref()
        .map_or(details.amount_shipping, |s| s.amount_total);
    let totals = OrderTotals::from_minor_units(currency, subtotal, shipping, details.amount_tax);

    if let Some(charged) = session.amount_total
        && currency.from_minor_units(charged) != totals.total
    {
        warn!(
            session_id = %session.id,
            charged,
            discount = details.amount_discount,
            "Charged amount differs from subtotal + shipping + tax"
        );
    }

    let items = session
        .line_items()
        .iter()
        .map(|li| order_item(li, currency))
        .collect::<Vec<_>>();
    if items.is_empty() {
        return Err(MaterializeError::NoLineItems);
    }

    let user_id = session
        .metadata
        .get(metadata::USER_ID)
        .and_then(|id| id.parse::<UserId>().ok());

    let customer = session.customer_details.as_ref();
    let shipping_details = session.shipping();
    let customer_name = customer
        .and_then(|c| c.name.clone())
        .or_else(|| shipping_details.and_then(|s| s.name.clone()));
    let customer_email = customer
        .and_then(|c| c.email.clone())
        .or_else(|| session.metadata.get(metadata::USER_EMAIL).cloned());
    let phone = customer.and_then(|c| c.phone.as_deref());

    let shipping_address = shipping_details.and_then(|s| {
        s.address
            .as_ref()
            .and_then(|a| a.to_address(s.name.as_deref(), phone))
    });
    let billing_address = customer.and_then(|c| {
        c.address
            .as_ref()
            .and_then(|a| a.to_address(c.name.as_deref(), phone))
    });

    Ok(NewOrder {
        user_id,
        customer_email,
        customer_name,
        items,
        shipping_address,
        billing_address,
        payment: PaymentInfo {
            session_id: session.id.clone(),
            payment_intent_id: session.payment_intent.clone(),
            status: session.payment_status,
        },
        totals,
        status: session.payment_status.initial_order_status(),
        guest_checkout: user_id.is_none(),
    })
}

fn order_item(line: &StripeLineItem, currency: CurrencyCode) -> OrderItem {
    let product = line.product();
    let quantity = line.quantity.unwrap_or(1).max(1);

    let product_id = product
        .and_then(|p| p.metadata.get(metadata::PRODUCT_ID))
        .and_then(|id| id.parse::<ProductId>().ok());
    let selected_options = product
        .and_then(|p| p.metadata.get(metadata::OPTIONS))
        .map(|json| {
            serde_json::from_str::<SelectedOptions>(json).unwrap_or_else(|e| {
                warn!(line_item = %line.id, error = %e, "Unreadable options metadata");
                SelectedOptions::new()
            })
        })
        .unwrap_or_default();

    let name = product
        .map(|p| p.name.clone())
        .or_else(|| line.description.clone())
        .unwrap_or_else(|| "Item".to_string());
    let image = product.and_then(|p| p.images.first().cloned());

    let unit_minor = line
        .price
        .as_ref()
        .and_then(|p| p.unit_amount)
        .unwrap_or_else(|| line.amount_subtotal / i64::from(quantity));

    OrderItem::new(
        product_id,
        name,
        image,
        quantity,
        selected_options,
        currency.from_minor_units(unit_minor),
    )
}

//! Stripe webhook endpoint.
//!
//! The body is taken as raw bytes: the signature covers the exact payload,
//! so it must be verified before any JSON parsing.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{instrument, warn};

use lunaria_core::OrderId;

use crate::error::Result;
use crate::middleware::RequestId;
use crate::models::NewOrder;
use crate::services::email::EmailService;
use crate::services::webhook::{WebhookOutcome, WebhookProcessor};
use crate::state::AppState;
use crate::stripe::webhook::SIGNATURE_HEADER;

/// Acknowledgement returned to Stripe.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

impl From<&WebhookOutcome> for WebhookAck {
    fn from(outcome: &WebhookOutcome) -> Self {
        let (name, order_id) = match outcome {
            WebhookOutcome::Ignored { .. } => ("ignored", None),
            WebhookOutcome::OrderCreated { order_id, .. } => ("order_created", Some(*order_id)),
            WebhookOutcome::AlreadyProcessed { order_id } => ("already_processed", Some(*order_id)),
            WebhookOutcome::PaymentUpdated { order_id, .. } => ("payment_updated", Some(*order_id)),
        };
        Self {
            received: true,
            outcome: name,
            order_id,
        }
    }
}

/// `POST /api/webhooks/stripe`
///
/// Signature failures answer `400`; failures after verification answer
/// `500` so Stripe redelivers.
#[instrument(skip_all, fields(request_id = %request_id.0))]
pub async fn stripe(
    State(state): State<AppState>,
    request_id: RequestId,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let now = chrono::Utc::now().timestamp();

    let processor = WebhookProcessor::new(
        state.stripe(),
        state.orders(),
        state.config().stripe.webhook_secret.expose_secret(),
    );
    let outcome = processor.handle(&body, signature, now).await?;
    let ack = WebhookAck::from(&outcome);

    if let Some((order_id, order)) = outcome.confirmation() {
        send_confirmation(state.email().clone(), order_id, order);
    }

    Ok(Json(ack))
}

/// Send the order confirmation in the background. Delivery failures are
/// logged and never fail the webhook.
fn send_confirmation(email: EmailService, order_id: OrderId, order: NewOrder) {
    let Some(to) = order.customer_email.clone() else {
        warn!(%order_id, "Order has no customer email, skipping confirmation");
        return;
    };

    tokio::spawn(async move {
        if let Err(e) = email.send_order_confirmation(&to, order_id, &order).await {
            warn!(%order_id, error = %e, "Failed to send order confirmation");
        }
    });
}

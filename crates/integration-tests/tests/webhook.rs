//! Webhook deliveries: signature checks, order creation, and idempotency.
//!
//! Run with: cargo test -p lunaria-integration-tests

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;

use lunaria_core::{OrderStatus, PaymentStatus, ProductId, SelectedOptions, UserId};
use lunaria_integration_tests::{
    FakeGateway, MemoryOrderStore, WEBHOOK_SECRET, completed_session, event_payload, now, session,
    signature_header,
};
use lunaria_storefront::services::webhook::events;
use lunaria_storefront::services::{WebhookError, WebhookOutcome, WebhookProcessor};
use lunaria_storefront::stripe::SignatureError;

const SESSION_ID: &str = "cs_test_moon";

struct Harness {
    gateway: FakeGateway,
    store: MemoryOrderStore,
}

impl Harness {
    fn with_session(payment_status: &str) -> Self {
        let gateway = FakeGateway::new();
        gateway.register(session(&completed_session(SESSION_ID, payment_status)));
        Self {
            gateway,
            store: MemoryOrderStore::new(),
        }
    }

    async fn deliver(&self, event_type: &str) -> Result<WebhookOutcome, WebhookError> {
        let payload = event_payload(event_type, SESSION_ID);
        let header = signature_header(&payload, WEBHOOK_SECRET, now());
        WebhookProcessor::new(&self.gateway, &self.store, WEBHOOK_SECRET)
            .handle(&payload, Some(&header), now())
            .await
    }
}

// ============================================================================
// Signature
// ============================================================================

#[tokio::test]
async fn test_unsigned_and_forged_deliveries_are_rejected() {
    let harness = Harness::with_session("paid");
    let processor = WebhookProcessor::new(&harness.gateway, &harness.store, WEBHOOK_SECRET);
    let payload = event_payload(events::SESSION_COMPLETED, SESSION_ID);

    let missing = processor.handle(&payload, None, now()).await.unwrap_err();
    assert!(matches!(missing, WebhookError::Signature(SignatureError::MissingHeader)));

    let forged = signature_header(&payload, "whsec_someone_else", now());
    let err = processor.handle(&payload, Some(&forged), now()).await.unwrap_err();
    assert!(matches!(err, WebhookError::Signature(SignatureError::Mismatch)));
    assert!(err.is_client_error());

    let stale = signature_header(&payload, WEBHOOK_SECRET, now() - 3600);
    let err = processor.handle(&payload, Some(&stale), now()).await.unwrap_err();
    assert!(matches!(
        err,
        WebhookError::Signature(SignatureError::TimestampOutOfTolerance)
    ));

    let tampered = signature_header(&payload, WEBHOOK_SECRET, now());
    let mut body = payload.clone();
    body.extend_from_slice(b" ");
    let err = processor.handle(&body, Some(&tampered), now()).await.unwrap_err();
    assert!(matches!(err, WebhookError::Signature(SignatureError::Mismatch)));

    assert_eq!(harness.gateway.retrievals(), 0);
    assert!(harness.store.orders().is_empty());
}

#[tokio::test]
async fn test_rolled_secret_accepts_any_matching_signature() {
    let harness = Harness::with_session("paid");
    let payload = event_payload(events::SESSION_COMPLETED, SESSION_ID);
    let t = now();
    let old = signature_header(&payload, "whsec_old", t);
    let current = signature_header(&payload, WEBHOOK_SECRET, t);
    let old_sig = old.split(",v1=").nth(1).unwrap();
    let header = format!("{current},v1={old_sig}");

    let outcome = WebhookProcessor::new(&harness.gateway, &harness.store, WEBHOOK_SECRET)
        .handle(&payload, Some(&header), t)
        .await
        .unwrap();
    assert!(matches!(outcome, WebhookOutcome::OrderCreated { .. }));
}

// ============================================================================
// Order creation
// ============================================================================

#[tokio::test]
async fn test_completed_session_creates_order() {
    let harness = Harness::with_session("paid");

    let outcome = harness.deliver(events::SESSION_COMPLETED).await.unwrap();
    let WebhookOutcome::OrderCreated { order_id, order } = outcome else {
        panic!("expected OrderCreated, got {outcome:?}");
    };

    let stored = harness.store.by_session(SESSION_ID).unwrap();
    assert_eq!(stored.id, order_id);
    assert_eq!(stored.order, *order);

    assert_eq!(order.user_id, Some(UserId::new(42)));
    assert!(!order.guest_checkout);
    assert_eq!(order.customer_email.as_deref(), Some("ana@example.ro"));
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.payment.status, PaymentStatus::Paid);
    assert_eq!(order.payment.payment_intent_id.as_deref(), Some("pi_test_1"));

    assert_eq!(order.items.len(), 2);
    let pendant = &order.items[0];
    assert_eq!(pendant.product_id, Some(ProductId::new(1)));
    assert_eq!(
        pendant.selected_options,
        SelectedOptions::new().with("Length", "45-50cm")
    );
    assert_eq!(pendant.unit_price, Decimal::new(100, 0));
    assert_eq!(pendant.quantity, 2);

    let shipping = order.shipping_address.as_ref().unwrap();
    assert_eq!(shipping.line2.as_deref(), Some("Ap. 3"));
    assert_eq!(shipping.country, "RO");
}

#[tokio::test]
async fn test_order_totals_add_up() {
    let harness = Harness::with_session("paid");
    harness.deliver(events::SESSION_COMPLETED).await.unwrap();

    let totals = harness.store.by_session(SESSION_ID).unwrap().order.totals;
    assert_eq!(totals.subtotal, Decimal::new(24990, 2));
    assert_eq!(totals.shipping_cost, Decimal::new(15, 0));
    assert_eq!(totals.tax, Decimal::new(1250, 2));
    assert_eq!(totals.total, Decimal::new(27740, 2));
    assert!(totals.is_consistent());
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let harness = Harness::with_session("paid");

    let first = harness.deliver(events::SESSION_COMPLETED).await.unwrap();
    let WebhookOutcome::OrderCreated { order_id, .. } = first else {
        panic!("expected OrderCreated, got {first:?}");
    };

    for _ in 0..3 {
        let again = harness.deliver(events::SESSION_COMPLETED).await.unwrap();
        assert_eq!(again, WebhookOutcome::AlreadyProcessed { order_id });
    }

    assert_eq!(harness.store.orders().len(), 1);
    assert_eq!(harness.gateway.retrievals(), 1);
}

#[tokio::test]
async fn test_concurrent_deliveries_create_one_order() {
    let harness = Harness::with_session("paid");

    let (a, b) = tokio::join!(
        harness.deliver(events::SESSION_COMPLETED),
        harness.deliver(events::SESSION_COMPLETED)
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let created = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::OrderCreated { .. }))
        .count();
    assert_eq!(created, 1);
    assert_eq!(harness.store.orders().len(), 1);
}

#[tokio::test]
async fn test_unknown_session_is_a_server_error() {
    let harness = Harness {
        gateway: FakeGateway::new(),
        store: MemoryOrderStore::new(),
    };

    let err = harness.deliver(events::SESSION_COMPLETED).await.unwrap_err();
    assert!(matches!(err, WebhookError::Stripe(_)));
    assert!(!err.is_client_error());
    assert!(harness.store.orders().is_empty());
}

#[tokio::test]
async fn test_unhandled_event_types_are_acknowledged() {
    let harness = Harness::with_session("paid");

    let outcome = harness.deliver("payment_intent.created").await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            event_type: "payment_intent.created".to_string()
        }
    );
    assert_eq!(harness.gateway.retrievals(), 0);
}

// ============================================================================
// Delayed payment methods
// ============================================================================

#[tokio::test]
async fn test_delayed_payment_settles_pending_order() {
    let harness = Harness::with_session("unpaid");

    let created = harness.deliver(events::SESSION_COMPLETED).await.unwrap();
    let WebhookOutcome::OrderCreated { order_id, order } = created else {
        panic!("expected OrderCreated, got {created:?}");
    };
    assert_eq!(order.status, OrderStatus::Pending);

    let settled = harness.deliver(events::ASYNC_PAYMENT_SUCCEEDED).await.unwrap();
    assert_eq!(
        settled,
        WebhookOutcome::PaymentUpdated {
            order_id,
            status: OrderStatus::Processing
        }
    );
    let stored = harness.store.by_session(SESSION_ID).unwrap();
    assert_eq!(stored.order.status, OrderStatus::Processing);
    assert_eq!(stored.order.payment.status, PaymentStatus::Paid);

    // A late failure for an order that already settled changes nothing.
    let late = harness.deliver(events::ASYNC_PAYMENT_FAILED).await.unwrap();
    assert_eq!(late, WebhookOutcome::AlreadyProcessed { order_id });
    assert_eq!(
        harness.store.by_session(SESSION_ID).unwrap().order.status,
        OrderStatus::Processing
    );
}

#[tokio::test]
async fn test_failed_payment_cancels_pending_order() {
    let harness = Harness::with_session("unpaid");
    harness.deliver(events::SESSION_COMPLETED).await.unwrap();

    let outcome = harness.deliver(events::ASYNC_PAYMENT_FAILED).await.unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::PaymentUpdated {
            status: OrderStatus::Cancelled,
            ..
        }
    ));
    let stored = harness.store.by_session(SESSION_ID).unwrap();
    assert_eq!(stored.order.payment.status, PaymentStatus::Unpaid);
}

#[tokio::test]
async fn test_async_event_before_completion_creates_order() {
    let harness = Harness::with_session("paid");

    let outcome = harness.deliver(events::ASYNC_PAYMENT_SUCCEEDED).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::OrderCreated { .. }));
    assert_eq!(
        harness.store.by_session(SESSION_ID).unwrap().order.status,
        OrderStatus::Processing
    );

    // The completion event arriving afterwards finds the order.
    let completed = harness.deliver(events::SESSION_COMPLETED).await.unwrap();
    assert!(matches!(completed, WebhookOutcome::AlreadyProcessed { .. }));
}

#[tokio::test]
async fn test_failure_before_completion_records_cancelled_order() {
    let harness = Harness::with_session("unpaid");

    let outcome = harness.deliver(events::ASYNC_PAYMENT_FAILED).await.unwrap();
    let WebhookOutcome::OrderCreated { order, .. } = &outcome else {
        panic!("expected OrderCreated, got {outcome:?}");
    };
    assert_eq!(order.status, OrderStatus::Cancelled);
    // No confirmation email for a payment that failed.
    assert!(outcome.confirmation().is_none());
}

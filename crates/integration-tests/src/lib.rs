//! Integration tests for Lunaria.
//!
//! The tests in `tests/` drive the storefront's checkout and webhook flows
//! end to end against in-memory stand-ins for the payment provider, the
//! catalog, and the order table. No database or network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p lunaria-integration-tests
//! ```
//!
//! # Fakes
//!
//! - [`FakeGateway`] - records session requests; serves scripted sessions
//! - [`FakeCatalog`] - products keyed by ID
//! - [`MemoryOrderStore`] - orders keyed by checkout session ID

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use lunaria_core::{CurrencyCode, OrderId, OrderStatus, PaymentStatus, ProductId};
use lunaria_storefront::db::RepositoryError;
use lunaria_storefront::models::{NewOrder, Product, ProductOption};
use lunaria_storefront::services::{OrderStore, ProductLookup};
use lunaria_storefront::stripe::webhook::compute_signature;
use lunaria_storefront::stripe::{
    CheckoutSession, CheckoutSessionRequest, PaymentGateway, StripeError,
};

/// Signing secret shared by tests and the processor under test.
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Catalog
// =============================================================================

/// A catalog product with sensible defaults.
#[must_use]
pub fn product(id: i64, slug: &str, base_price: Decimal) -> Product {
    Product {
        id: ProductId::new(id),
        slug: slug.to_string(),
        name: slug
            .split('-')
            .map(|w| {
                let mut chars = w.chars();
                chars.next().map_or_else(String::new, |c| {
                    c.to_uppercase().chain(chars).collect::<String>()
                })
            })
            .collect::<Vec<_>>()
            .join(" "),
        description: String::new(),
        base_price,
        currency: CurrencyCode::EUR,
        images: vec![format!("https://cdn.lunaria.ro/{slug}.jpg")],
        options: Vec::new(),
        in_stock: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// The moon pendant with its two chain lengths, 95 EUR.
#[must_use]
pub fn moon_pendant() -> Product {
    let mut p = product(1, "moon-pendant", Decimal::new(95, 0));
    p.options = vec![ProductOption {
        name: "Length".to_string(),
        values: vec!["40-45cm".to_string(), "45-50cm".to_string()],
    }];
    p
}

/// Products keyed by ID.
#[derive(Default)]
pub struct FakeCatalog {
    products: HashMap<ProductId, Arc<Product>>,
}

impl FakeCatalog {
    #[must_use]
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products
                .into_iter()
                .map(|p| (p.id, Arc::new(p)))
                .collect(),
        }
    }
}

impl ProductLookup for FakeCatalog {
    async fn product(&self, id: ProductId) -> Result<Option<Arc<Product>>, RepositoryError> {
        Ok(self.products.get(&id).cloned())
    }
}

// =============================================================================
// Payment provider
// =============================================================================

/// Records every session request and serves sessions registered with
/// [`FakeGateway::register`].
#[derive(Default)]
pub struct FakeGateway {
    requests: Mutex<Vec<CheckoutSessionRequest>>,
    sessions: Mutex<HashMap<String, CheckoutSession>>,
    retrievals: AtomicUsize,
    fail_create: Option<String>,
    omit_url: bool,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose create call fails with the given Stripe error code.
    #[must_use]
    pub fn declining(code: &str) -> Self {
        Self {
            fail_create: Some(code.to_string()),
            ..Self::default()
        }
    }

    /// A gateway that creates sessions without a hosted page URL.
    #[must_use]
    pub fn without_url() -> Self {
        Self {
            omit_url: true,
            ..Self::default()
        }
    }

    /// Make a session available to `retrieve_checkout_session`.
    pub fn register(&self, session: CheckoutSession) {
        lock(&self.sessions).insert(session.id.clone(), session);
    }

    /// Session requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        lock(&self.requests).clone()
    }

    /// Number of retrieve calls made.
    #[must_use]
    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        if let Some(code) = &self.fail_create {
            return Err(StripeError::Api {
                status: 402,
                code: Some(code.clone()),
                message: "declined".to_string(),
            });
        }

        let mut requests = lock(&self.requests);
        requests.push(request.clone());
        let id = format!("cs_test_{}", requests.len());
        let url = (!self.omit_url).then(|| format!("https://checkout.stripe.com/c/pay/{id}"));
        parse_session(&json!({ "id": id, "url": url }))
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, StripeError> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        lock(&self.sessions)
            .get(session_id)
            .cloned()
            .ok_or_else(|| StripeError::Api {
                status: 404,
                code: Some("resource_missing".to_string()),
                message: format!("No such checkout.session: '{session_id}'"),
            })
    }
}

fn parse_session(value: &Value) -> Result<CheckoutSession, StripeError> {
    serde_json::from_value(value.clone()).map_err(|e| StripeError::Parse(e.to_string()))
}

// =============================================================================
// Orders
// =============================================================================

/// A stored order.
#[derive(Debug, Clone)]
pub struct StoredOrder {
    pub id: OrderId,
    pub order: NewOrder,
}

/// Orders held in memory, unique by checkout session ID.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<Vec<StoredOrder>>,
    next_id: AtomicI64,
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored order.
    #[must_use]
    pub fn orders(&self) -> Vec<StoredOrder> {
        lock(&self.orders).clone()
    }

    /// The order for a session, if any.
    #[must_use]
    pub fn by_session(&self, session_id: &str) -> Option<StoredOrder> {
        lock(&self.orders)
            .iter()
            .find(|o| o.order.payment.session_id == session_id)
            .cloned()
    }
}

impl OrderStore for MemoryOrderStore {
    async fn find_by_session(&self, session_id: &str) -> Result<Option<OrderId>, RepositoryError> {
        Ok(self.by_session(session_id).map(|o| o.id))
    }

    async fn insert_if_absent(&self, order: &NewOrder) -> Result<Option<OrderId>, RepositoryError> {
        let mut orders = lock(&self.orders);
        if orders
            .iter()
            .any(|o| o.order.payment.session_id == order.payment.session_id)
        {
            return Ok(None);
        }
        let id = OrderId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        orders.push(StoredOrder {
            id,
            order: order.clone(),
        });
        Ok(Some(id))
    }

    async fn update_payment_status(
        &self,
        session_id: &str,
        payment_status: PaymentStatus,
        status: OrderStatus,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let mut orders = lock(&self.orders);
        let Some(stored) = orders.iter_mut().find(|o| {
            o.order.payment.session_id == session_id && o.order.status == OrderStatus::Pending
        }) else {
            return Ok(None);
        };
        stored.order.payment.status = payment_status;
        stored.order.status = status;
        Ok(Some(stored.id))
    }
}

// =============================================================================
// Webhook deliveries
// =============================================================================

/// Current unix time in seconds.
#[must_use]
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Event body for a session event.
#[must_use]
pub fn event_payload(event_type: &str, session_id: &str) -> Vec<u8> {
    json!({
        "id": format!("evt_{session_id}_{}", event_type.rsplit('.').next().unwrap_or_default()),
        "type": event_type,
        "data": { "object": { "id": session_id, "object": "checkout.session" } },
    })
    .to_string()
    .into_bytes()
}

/// `Stripe-Signature` header for a payload signed at `timestamp`.
///
/// # Panics
///
/// Panics if the secret cannot key the HMAC, which never happens for a
/// non-empty secret.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = compute_signature(secret, timestamp, payload).unwrap();
    format!("t={timestamp},v1={signature}")
}

/// An expanded, completed checkout session as the provider returns it.
///
/// Two pendants (one with the long chain, 100 EUR each) and one star ring
/// at 49.90 EUR, 15 EUR shipping, 12.50 EUR tax.
#[must_use]
pub fn completed_session(session_id: &str, payment_status: &str) -> Value {
    json!({
        "id": session_id,
        "url": null,
        "payment_status": payment_status,
        "payment_intent": "pi_test_1",
        "currency": "eur",
        "amount_subtotal": 24990,
        "amount_total": 27740,
        "total_details": { "amount_discount": 0, "amount_shipping": 1500, "amount_tax": 1250 },
        "shipping_cost": { "amount_total": 1500, "shipping_rate": "shr_standard" },
        "customer_details": {
            "email": "ana@example.ro",
            "name": "Ana Popescu",
            "phone": "+40700000000",
            "address": {
                "line1": "Strada Lunii 7", "line2": null, "city": "Cluj-Napoca",
                "state": "CJ", "postal_code": "400001", "country": "RO"
            }
        },
        "collected_information": {
            "shipping_details": {
                "name": "Ana Popescu",
                "address": {
                    "line1": "Strada Lunii 7", "line2": "Ap. 3", "city": "Cluj-Napoca",
                    "state": "CJ", "postal_code": "400001", "country": "RO"
                }
            }
        },
        "metadata": { "user_id": "42", "user_email": "ana@example.ro", "item_count": "3" },
        "line_items": {
            "has_more": false,
            "data": [
                {
                    "id": "li_1",
                    "description": "Moon Pendant",
                    "quantity": 2,
                    "amount_subtotal": 20000,
                    "amount_total": 20000,
                    "price": {
                        "unit_amount": 10000,
                        "product": {
                            "id": "prod_1",
                            "name": "Moon Pendant",
                            "images": ["https://cdn.lunaria.ro/moon-pendant.jpg"],
                            "metadata": { "product_id": "1", "options": "{\"Length\":\"45-50cm\"}" }
                        }
                    }
                },
                {
                    "id": "li_2",
                    "description": "Star Ring",
                    "quantity": 1,
                    "amount_subtotal": 4990,
                    "amount_total": 4990,
                    "price": {
                        "unit_amount": 4990,
                        "product": {
                            "id": "prod_2",
                            "name": "Star Ring",
                            "images": [],
                            "metadata": { "product_id": "2" }
                        }
                    }
                }
            ]
        }
    })
}

/// Parse a session built with [`completed_session`] or by hand.
///
/// # Panics
///
/// Panics if the JSON is not a valid checkout session.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn session(value: &Value) -> CheckoutSession {
    parse_session(value).unwrap()
}

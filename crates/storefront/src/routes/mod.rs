//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Readiness (database ping)
//!
//! # Catalog
//! GET    /api/products                    - Paged product listing
//! GET    /api/products/{slug}             - Product detail (?option.<Name>=<value>)
//! GET    /api/products/{slug}/price       - Price for a selection
//!
//! # Cart (session)
//! GET    /api/cart                        - Priced cart
//! DELETE /api/cart                        - Clear
//! GET    /api/cart/count                  - Total quantity
//! POST   /api/cart/items                  - Add line (merges equal lines)
//! PATCH  /api/cart/items/{index}          - Set quantity (0 removes)
//! DELETE /api/cart/items/{index}          - Remove line
//!
//! # Checkout
//! POST   /api/checkout/session            - Hosted checkout for the cart
//! POST   /api/checkout/buy-now            - Hosted checkout for one line
//! GET    /api/checkout/success            - Return from checkout, clears cart
//!
//! # Webhooks
//! POST   /api/webhooks/stripe             - Stripe event delivery
//!
//! # Auth (rate limited)
//! POST   /api/auth/register
//! POST   /api/auth/login
//! POST   /api/auth/logout
//! POST   /api/auth/verify-email
//! POST   /api/auth/password-reset/request
//! POST   /api/auth/password-reset/confirm
//!
//! # Account (requires auth)
//! GET    /api/account                     - Current user
//! GET    /api/account/orders              - Order history
//! GET    /api/account/orders/{id}         - One owned order
//!
//! # Blog
//! GET    /api/articles                    - Published articles
//! GET    /api/articles/{slug}             - Article with rendered HTML
//! ```

pub mod account;
pub mod auth;
pub mod blog;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tracing::warn;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page size a client may request.
pub const MAX_PER_PAGE: u32 = 50;

/// Paging query shared by listings.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// `(page, per_page)` with defaults applied and `per_page` clamped.
    #[must_use]
    pub fn resolve(self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page)
    }
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
        .route("/{slug}/price", get(products::price))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/count", get(cart::count))
        .route("/items", post(cart::add))
        .route("/items/{index}", patch(cart::update).delete(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/session", post(checkout::create_session))
        .route("/buy-now", post(checkout::buy_now))
        .route("/success", get(checkout::success))
}

/// Create the auth routes router, rate limited per client IP.
pub fn auth_routes() -> Router<AppState> {
    let router = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/verify-email", post(auth::verify_email))
        .route("/password-reset/request", post(auth::request_password_reset))
        .route("/password-reset/confirm", post(auth::confirm_password_reset));

    match auth_rate_limiter() {
        Some(limiter) => router.layer(limiter),
        None => {
            warn!("Auth rate limiter unavailable");
            router
        }
    }
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::me))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
}

/// Create the blog routes router.
pub fn blog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(blog::index))
        .route("/{slug}", get(blog::show))
}

/// The JSON API under `/api`.
///
/// The webhook route sits outside the general rate limit; Stripe retries
/// bursts of deliveries from a small set of IPs.
pub fn api_routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/account", account_routes())
        .nest("/articles", blog_routes());

    let api = match api_rate_limiter() {
        Some(limiter) => api.layer(limiter),
        None => {
            warn!("API rate limiter unavailable");
            api
        }
    };

    api.nest("/auth", auth_routes())
        .route("/webhooks/stripe", post(webhooks::stripe))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .nest("/api", api_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_and_clamps() {
        let q = PageQuery {
            page: None,
            per_page: None,
        };
        assert_eq!(q.resolve(), (1, DEFAULT_PER_PAGE));

        let q = PageQuery {
            page: Some(0),
            per_page: Some(500),
        };
        assert_eq!(q.resolve(), (1, MAX_PER_PAGE));
    }
}

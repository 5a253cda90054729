//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login, email verification, password reset
//! - `cart` - Pricing the session cart for display
//! - `catalog` - Cached product lookups
//! - `checkout` - Validating carts and opening hosted checkout sessions
//! - `email` - Transactional email (order confirmation, account links)
//! - `webhook` - Turning confirmed payments into orders

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod email;
pub mod webhook;

pub use auth::{AuthError, AuthService};
pub use catalog::{CatalogService, ProductLookup};
pub use checkout::{CheckoutError, CheckoutSettings};
pub use email::{EmailError, EmailService};
pub use webhook::{OrderStore, PgOrderStore, WebhookError, WebhookOutcome, WebhookProcessor};

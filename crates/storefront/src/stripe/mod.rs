//! Stripe hosted checkout integration.
//!
//! # Modules
//!
//! - [`client`] - REST client for checkout session create/retrieve
//! - [`types`] - Request and response types (form encoding of session requests)
//! - [`webhook`] - `Stripe-Signature` verification and event parsing
//! - [`errors`] - Provider error code to localized message table
//!
//! The rest of the crate talks to Stripe through [`PaymentGateway`], so the
//! checkout builder and the webhook consumer can run against a fake.

pub mod client;
pub mod errors;
pub mod types;
pub mod webhook;

use std::future::Future;

use thiserror::Error;

pub use client::StripeClient;
pub use errors::{Locale, payment_error_message};
pub use types::{
    CheckoutSession, CheckoutSessionRequest, Event, LineItemRequest, StripeAddress,
    StripeLineItem, StripeProduct,
};
pub use webhook::{SignatureError, verify_signature};

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        /// Stripe error code, e.g. `card_declined`.
        code: Option<String>,
        message: String,
    },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl StripeError {
    /// Provider error code, when Stripe returned one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Operations the storefront needs from the payment provider.
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session.
    fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> impl Future<Output = Result<CheckoutSession, StripeError>> + Send;

    /// Retrieve a checkout session with its line items and their products
    /// expanded.
    fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<CheckoutSession, StripeError>> + Send;
}

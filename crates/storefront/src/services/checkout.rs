//! Checkout session creation.
//!
//! Every submitted line is re-resolved against the catalog and re-priced
//! here; nothing the client sends about prices is used. The resulting
//! session carries enough metadata (user identity, per-line product ID and
//! options) for the webhook consumer to rebuild the order later.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use lunaria_core::cart::{MAX_LINE_QUANTITY, MAX_LINES};
use lunaria_core::pricing::{self, LinePrice};
use lunaria_core::{CartLine, CurrencyCode, PriceError, ProductId};

use crate::config::StorefrontConfig;
use crate::db::RepositoryError;
use crate::models::{CurrentUser, OptionError, Product};
use crate::services::catalog::ProductLookup;
use crate::stripe::{
    CheckoutSessionRequest, LineItemRequest, Locale, PaymentGateway, StripeError,
};

/// Metadata keys shared with the webhook consumer.
pub mod metadata {
    pub const USER_ID: &str = "user_id";
    pub const USER_EMAIL: &str = "user_email";
    pub const ITEM_COUNT: &str = "item_count";
    pub const ITEMS: &str = "items";
    pub const PRODUCT_ID: &str = "product_id";
    pub const OPTIONS: &str = "options";
}

/// Stripe caps metadata values at 500 characters.
const METADATA_VALUE_MAX: usize = 500;

/// Errors raised while validating or creating a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("checkout supports at most {max} lines (got {0})", max = MAX_LINES)]
    TooManyLines(usize),

    #[error("line {index}: quantity must be between 1 and {max} (got {quantity})", max = MAX_LINE_QUANTITY)]
    InvalidQuantity { index: usize, quantity: u32 },

    #[error("line {index}: product {product_id} not found")]
    ProductNotFound { index: usize, product_id: ProductId },

    #[error("line {index}: {name} is out of stock")]
    OutOfStock { index: usize, name: String },

    #[error("line {index}: {source}")]
    InvalidOption {
        index: usize,
        #[source]
        source: OptionError,
    },

    #[error("line {index}: price is not chargeable: {source}")]
    InvalidPrice {
        index: usize,
        #[source]
        source: PriceError,
    },

    #[error("line {index}: product is priced in {found}, store currency is {expected}")]
    CurrencyMismatch {
        index: usize,
        found: CurrencyCode,
        expected: CurrencyCode,
    },

    #[error("payment provider returned no checkout URL")]
    MissingCheckoutUrl,

    #[error(transparent)]
    Stripe(#[from] StripeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CheckoutError {
    /// Whether the request itself was at fault (4xx).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Stripe(_) | Self::Repository(_) | Self::MissingCheckoutUrl
        )
    }
}

/// Store-level checkout settings.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub base_url: String,
    pub currency: CurrencyCode,
    pub allowed_countries: Vec<String>,
    pub shipping_rates: Vec<String>,
    pub automatic_tax: bool,
}

impl CheckoutSettings {
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            currency: config.currency,
            allowed_countries: config.stripe.allowed_countries.clone(),
            shipping_rates: config.stripe.shipping_rates.clone(),
            automatic_tax: config.stripe.automatic_tax,
        }
    }
}

/// A validated line with its catalog product and server-side price.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product: Arc<Product>,
    pub line: CartLine,
    pub price: LinePrice,
}

/// Where to send the shopper.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub url: String,
}

/// Resolve one line against the catalog: product exists and is in stock,
/// options are valid, and the unit price is chargeable.
///
/// # Errors
///
/// Returns the first [`CheckoutError`] found for the line.
pub async fn resolve_line<L: ProductLookup>(
    lookup: &L,
    index: usize,
    line: &CartLine,
    currency: CurrencyCode,
) -> Result<PricedLine, CheckoutError> {
    if line.validate().is_err() {
        return Err(CheckoutError::InvalidQuantity {
            index,
            quantity: line.quantity,
        });
    }

    let product = lookup
        .product(line.product_id)
        .await?
        .ok_or(CheckoutError::ProductNotFound {
            index,
            product_id: line.product_id,
        })?;

    if !product.in_stock {
        return Err(CheckoutError::OutOfStock {
            index,
            name: product.name.clone(),
        });
    }
    if product.currency != currency {
        return Err(CheckoutError::CurrencyMismatch {
            index,
            found: product.currency,
            expected: currency,
        });
    }
    product
        .validate_selection(&line.selected_options)
        .map_err(|source| CheckoutError::InvalidOption { index, source })?;

    let price = pricing::price_line(product.base_price, &line.selected_options, line.quantity);
    if price.unit_price <= Decimal::ZERO {
        return Err(CheckoutError::InvalidPrice {
            index,
            source: PriceError::NotPositive(price.unit_price),
        });
    }
    currency
        .to_minor_units(price.unit_price)
        .map_err(|source| CheckoutError::InvalidPrice { index, source })?;

    Ok(PricedLine {
        product,
        line: line.clone(),
        price,
    })
}

/// Validate and price every line of a checkout.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] or [`CheckoutError::TooManyLines`]
/// for a bad line count, otherwise the first per-line error.
pub async fn price_lines<L: ProductLookup>(
    lookup: &L,
    lines: &[CartLine],
    currency: CurrencyCode,
) -> Result<Vec<PricedLine>, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    if lines.len() > MAX_LINES {
        return Err(CheckoutError::TooManyLines(lines.len()));
    }

    let mut priced = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        priced.push(resolve_line(lookup, index, line, currency).await?);
    }
    Ok(priced)
}

/// Build the provider request for priced lines.
///
/// # Errors
///
/// Returns [`CheckoutError::InvalidPrice`] if a unit price cannot be
/// expressed in minor units.
pub fn build_session_request(
    lines: &[PricedLine],
    customer: Option<&CurrentUser>,
    settings: &CheckoutSettings,
    locale: Locale,
) -> Result<CheckoutSessionRequest, CheckoutError> {
    let mut line_items = Vec::with_capacity(lines.len());
    for (index, priced) in lines.iter().enumerate() {
        let unit_amount = settings
            .currency
            .to_minor_units(priced.price.unit_price)
            .map_err(|source| CheckoutError::InvalidPrice { index, source })?;

        let mut item_metadata = BTreeMap::from([(
            metadata::PRODUCT_ID.to_string(),
            priced.product.id.to_string(),
        )]);
        let options = &priced.line.selected_options;
        if !options.is_empty() {
            // SelectedOptions is a string map; serialization cannot fail.
            let json = serde_json::to_string(options).unwrap_or_default();
            item_metadata.insert(metadata::OPTIONS.to_string(), json);
        }

        line_items.push(LineItemRequest {
            name: priced.product.name.clone(),
            description: (!options.is_empty()).then(|| options.summary()),
            image: priced.product.primary_image().map(String::from),
            currency: settings.currency.provider_code().to_string(),
            unit_amount,
            quantity: priced.line.quantity,
            metadata: item_metadata,
        });
    }

    let item_count: u32 = lines.iter().map(|l| l.line.quantity).sum();
    let mut session_metadata = BTreeMap::from([
        (metadata::ITEM_COUNT.to_string(), item_count.to_string()),
        (metadata::ITEMS.to_string(), item_summary(lines)),
    ]);
    if let Some(user) = customer {
        session_metadata.insert(metadata::USER_ID.to_string(), user.id.to_string());
        session_metadata.insert(metadata::USER_EMAIL.to_string(), user.email.to_string());
    }

    Ok(CheckoutSessionRequest {
        success_url: format!(
            "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
            settings.base_url
        ),
        cancel_url: format!("{}/cart", settings.base_url),
        line_items,
        metadata: session_metadata,
        customer_email: customer.map(|u| u.email.to_string()),
        client_reference_id: customer.map(|u| u.id.to_string()),
        allowed_countries: settings.allowed_countries.clone(),
        shipping_rates: settings.shipping_rates.clone(),
        automatic_tax: settings.automatic_tax,
        locale: Some(locale.code().to_string()),
    })
}

/// Validate, price, and open a hosted checkout session.
///
/// # Errors
///
/// Returns [`CheckoutError`] for invalid lines or provider failures.
#[instrument(skip_all, fields(lines = lines.len(), user_id = customer.map(|c| c.id.as_i64())))]
pub async fn create_checkout<L, G>(
    lookup: &L,
    gateway: &G,
    lines: &[CartLine],
    customer: Option<&CurrentUser>,
    settings: &CheckoutSettings,
    locale: Locale,
) -> Result<CheckoutRedirect, CheckoutError>
where
    L: ProductLookup,
    G: PaymentGateway,
{
    let priced = price_lines(lookup, lines, settings.currency).await?;
    let request = build_session_request(&priced, customer, settings, locale)?;
    let session = gateway.create_checkout_session(&request).await?;
    let url = session.url.ok_or(CheckoutError::MissingCheckoutUrl)?;

    Ok(CheckoutRedirect {
        session_id: session.id,
        url,
    })
}

/// Human-readable summary for the session metadata, e.g.
/// `Moon Pendant (Length: 45-50cm) x2; Star Ring x1`.
fn item_summary(lines: &[PricedLine]) -> String {
    let summary = lines
        .iter()
        .map(|l| {
            let options = l.line.selected_options.summary();
            if options.is_empty() {
                format!("{} x{}", l.product.name, l.line.quantity)
            } else {
                format!("{} ({options}) x{}", l.product.name, l.line.quantity)
            }
        })
        .collect::<Vec<_>>()
        .join("; ");
    truncate_chars(&summary, METADATA_VALUE_MAX)
}

fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max - 1).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        let long = "ă".repeat(600);
        let truncated = truncate_chars(&long, METADATA_VALUE_MAX);
        assert_eq!(truncated.chars().count(), METADATA_VALUE_MAX);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(CheckoutError::EmptyCart.is_client_error());
        assert!(CheckoutError::TooManyLines(101).is_client_error());
        assert!(!CheckoutError::MissingCheckoutUrl.is_client_error());
        assert!(!CheckoutError::Repository(RepositoryError::NotFound).is_client_error());
    }
}

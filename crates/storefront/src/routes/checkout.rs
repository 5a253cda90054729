//! Checkout route handlers.
//!
//! Both entry points run the same pipeline: resolve lines against the
//! catalog, price them server-side, and open a hosted checkout session. The
//! session cart is left intact until the shopper returns on the success URL.

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, header::ACCEPT_LANGUAGE},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use lunaria_core::{CartLine, OrderId, ProductId, SelectedOptions};

use crate::db::OrderRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, load_cart, save_cart};
use crate::models::CurrentUser;
use crate::services::checkout::{CheckoutRedirect, create_checkout};
use crate::state::AppState;
use crate::stripe::Locale;

/// Optional body of `POST /api/checkout/session`. Without `lines`, the
/// session cart is checked out.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    pub lines: Option<Vec<CartLine>>,
}

/// Body of `POST /api/checkout/buy-now`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyNowBody {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub selected_options: SelectedOptions,
}

const fn one() -> u32 {
    1
}

/// Query of the success return URL.
#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: String,
}

/// Whether the order for a returning shopper exists yet.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    pub order_id: Option<OrderId>,
    /// Order status, or `awaiting_confirmation` until the webhook lands.
    pub status: &'static str,
}

/// Shopper language for the hosted page and payment error messages.
fn locale(headers: &HeaderMap) -> Locale {
    headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .map_or_else(Locale::default, Locale::from_accept_language)
}

async fn checkout(
    state: &AppState,
    lines: &[CartLine],
    customer: Option<&CurrentUser>,
    locale: Locale,
) -> Result<Json<CheckoutRedirect>> {
    let redirect = create_checkout(
        state.catalog(),
        state.stripe(),
        lines,
        customer,
        state.checkout_settings(),
        locale,
    )
    .await
    .map_err(|e| AppError::checkout(e, locale))?;

    info!(session_id = %redirect.session_id, "Checkout session created");
    add_breadcrumb(
        "checkout",
        "Checkout session created",
        &[("session_id", &redirect.session_id)],
    );
    Ok(Json(redirect))
}

/// `POST /api/checkout/session`
#[instrument(skip_all)]
pub async fn create_session(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    body: Option<Json<CheckoutBody>>,
) -> Result<Json<CheckoutRedirect>> {
    let lines = match body.and_then(|Json(b)| b.lines) {
        Some(lines) => lines,
        None => load_cart(&session).await?.lines().to_vec(),
    };
    checkout(&state, &lines, user.as_ref(), locale(&headers)).await
}

/// `POST /api/checkout/buy-now`
#[instrument(skip_all, fields(product_id = %body.product_id))]
pub async fn buy_now(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Json(body): Json<BuyNowBody>,
) -> Result<Json<CheckoutRedirect>> {
    let line = CartLine::new(body.product_id, body.quantity, body.selected_options);
    checkout(&state, &[line], user.as_ref(), locale(&headers)).await
}

/// `GET /api/checkout/success?session_id=...`
///
/// Clears the session cart and reports whether the webhook has created the
/// order yet.
#[instrument(skip(state, session))]
pub async fn success(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<CheckoutResult>> {
    if !query.session_id.starts_with("cs_") {
        return Err(AppError::BadRequest("invalid session_id".to_string()));
    }

    let mut cart = load_cart(&session).await?;
    if !cart.is_empty() {
        cart.clear();
        save_cart(&session, &cart).await?;
    }

    let order = OrderRepository::new(state.pool())
        .get_by_session_id(&query.session_id)
        .await?;

    Ok(Json(match order {
        Some(order) => CheckoutResult {
            order_id: Some(order.id),
            status: order.status.as_str(),
        },
        None => CheckoutResult {
            order_id: None,
            status: "awaiting_confirmation",
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_locale_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(locale(&headers), Locale::En);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ro-RO,ro;q=0.9,en;q=0.8"));
        assert_eq!(locale(&headers), Locale::Ro);
    }

    #[test]
    fn test_checkout_body_lines_are_optional() {
        let body: CheckoutBody = serde_json::from_str("{}").unwrap_or_default();
        assert!(body.lines.is_none());

        let body: CheckoutBody = serde_json::from_value(serde_json::json!({
            "lines": [{"productId": 7, "quantity": 2, "selectedOptions": {"Length": "45-50cm"}}]
        }))
        .unwrap_or_default();
        let lines = body.lines.unwrap_or_default();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().map(|l| l.quantity), Some(2));
    }
}

//! Cart route handlers.
//!
//! The cart lives in the visitor's session and holds only product IDs,
//! options, and quantities. Every response re-prices it from the catalog.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use lunaria_core::{Cart, CartLine, ProductId, SelectedOptions};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{load_cart, save_cart};
use crate::services::ProductLookup;
use crate::services::cart::{CartView, view_cart};
use crate::state::AppState;

/// Body of `POST /api/cart/items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub selected_options: SelectedOptions,
}

const fn default_quantity() -> u32 {
    1
}

/// Body of `PATCH /api/cart/items/{index}`.
#[derive(Debug, Deserialize)]
pub struct UpdateItem {
    pub quantity: u32,
}

/// Response of `GET /api/cart/count`.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

/// Price the cart and persist it if deleted products were dropped.
async fn respond(state: &AppState, session: &Session, mut cart: Cart) -> Result<Json<CartView>> {
    let currency = state.checkout_settings().currency;
    let (view, changed) = view_cart(state.catalog(), &mut cart, currency).await?;
    if changed {
        save_cart(session, &cart).await?;
    }
    Ok(Json(view))
}

/// `GET /api/cart`
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    respond(&state, &session, cart).await
}

/// `POST /api/cart/items`
///
/// The product must exist and the selection must match its options; an
/// equal line (same product and options) has its quantity incremented.
#[instrument(skip(state, session), fields(product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AddItem>,
) -> Result<(StatusCode, Json<CartView>)> {
    let product = state
        .catalog()
        .product(body.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {}", body.product_id)))?;
    if !product.in_stock {
        return Err(AppError::BadRequest(format!("{} is out of stock", product.name)));
    }
    product
        .validate_selection(&body.selected_options)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut cart = load_cart(&session).await?;
    cart.add(CartLine::new(body.product_id, body.quantity, body.selected_options))?;
    save_cart(&session, &cart).await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        &[("product_id", &body.product_id.to_string())],
    );

    let view = respond(&state, &session, cart).await?;
    Ok((StatusCode::CREATED, view))
}

/// `PATCH /api/cart/items/{index}`; quantity `0` removes the line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(index): Path<usize>,
    Json(body): Json<UpdateItem>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.set_quantity(index, body.quantity)?;
    save_cart(&session, &cart).await?;
    respond(&state, &session, cart).await
}

/// `DELETE /api/cart/items/{index}`
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Path(index): Path<usize>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.remove(index)?;
    save_cart(&session, &cart).await?;
    respond(&state, &session, cart).await
}

/// `DELETE /api/cart`
#[instrument(skip_all)]
pub async fn clear(session: Session) -> Result<StatusCode> {
    let mut cart = load_cart(&session).await?;
    cart.clear();
    save_cart(&session, &cart).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/cart/count`
pub async fn count(session: Session) -> Result<Json<CartCount>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartCount {
        count: cart.total_quantity(),
    }))
}

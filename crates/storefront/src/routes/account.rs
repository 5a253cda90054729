//! Account route handlers. Every route requires a logged-in user.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use lunaria_core::OrderId;

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, User};
use crate::services::AuthService;
use crate::state::AppState;

/// `GET /api/account`
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(Json(user))
}

/// `GET /api/account/orders`, newest first. Guest orders placed with the
/// same email are not included.
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current.id)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/account/orders/{id}`; another user's order is a 404.
#[instrument(skip(state, current), fields(user_id = %current.id))]
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    OrderRepository::new(state.pool())
        .get_for_user(id, current.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

//! Authentication route handlers.
//!
//! Password accounts with session-based login. Verification and reset links
//! are emailed; their tokens are single-use.

use std::fmt;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::AuthService;
use crate::state::AppState;

/// Body of `POST /api/auth/register`.
#[derive(Deserialize)]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Body of `POST /api/auth/login`.
#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/auth/verify-email`.
#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub token: String,
}

/// Body of `POST /api/auth/password-reset/request`.
#[derive(Debug, Deserialize)]
pub struct ResetRequestBody {
    pub email: String,
}

/// Body of `POST /api/auth/password-reset/confirm`.
#[derive(Deserialize)]
pub struct ResetConfirmBody {
    pub token: String,
    pub password: String,
}

impl fmt::Debug for RegisterBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterBody")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Debug for LoginBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginBody")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Debug for ResetConfirmBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetConfirmBody")
            .field("token", &"[REDACTED]")
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// The logged-in account.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
}

async fn start_session(session: &Session, user: &User) -> Result<()> {
    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
    };
    set_current_user(session, &current).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// `POST /api/auth/register`
///
/// Creates the account, logs it in, and emails a verification link. A
/// failed email does not fail registration.
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let (user, token) = AuthService::new(state.pool())
        .register(&body.email, &body.password, &body.name)
        .await?;

    if let Err(e) = state
        .email()
        .send_verification(user.email.as_str(), &user.name, &token)
        .await
    {
        warn!(user_id = %user.id, error = %e, "Failed to send verification email");
    }

    start_session(&session, &user).await?;
    info!(user_id = %user.id, "Account registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { user })))
}

/// `POST /api/auth/login`
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginBody>,
) -> Result<Json<AuthResponse>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    start_session(&session, &user).await?;
    info!(user_id = %user.id, "Logged in");
    Ok(Json(AuthResponse { user }))
}

/// `POST /api/auth/logout`
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/auth/verify-email`
#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<TokenBody>,
) -> Result<Json<Value>> {
    let user_id = AuthService::new(state.pool())
        .verify_email(&body.token)
        .await?;
    info!(%user_id, "Email verified");
    Ok(Json(json!({ "verified": true })))
}

/// `POST /api/auth/password-reset/request`
///
/// Always `202`, whether or not the account exists.
#[instrument(skip_all)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetRequestBody>,
) -> Result<StatusCode> {
    if let Some((user, token)) = AuthService::new(state.pool())
        .request_password_reset(&body.email)
        .await?
        && let Err(e) = state
            .email()
            .send_password_reset(user.email.as_str(), &user.name, &token)
            .await
    {
        warn!(user_id = %user.id, error = %e, "Failed to send password reset email");
    }
    Ok(StatusCode::ACCEPTED)
}

/// `POST /api/auth/password-reset/confirm`
#[instrument(skip_all)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetConfirmBody>,
) -> Result<Json<Value>> {
    let user_id = AuthService::new(state.pool())
        .reset_password(&body.token, &body.password)
        .await?;
    info!(%user_id, "Password reset");
    Ok(Json(json!({ "reset": true })))
}

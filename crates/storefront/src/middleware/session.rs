//! Session middleware configuration and the session-held cart.
//!
//! Sessions live in `PostgreSQL` via tower-sessions; the cookie carries only
//! the session ID, signed with a key derived from the session secret. The
//! visitor's cart is stored in the session under [`session_keys::CART`].

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::{Key, KeyError};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::warn;

use lunaria_core::Cart;

use crate::config::StorefrontConfig;
use crate::models::session_keys;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "lunaria_session";

/// Session expiry time in seconds (7 days of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Cookie signing key: SHA-512 of the session secret (64 bytes).
fn signing_key(config: &StorefrontConfig) -> Result<Key, KeyError> {
    let digest = Sha512::digest(config.session_secret.expose_secret().as_bytes());
    Key::try_from(digest.as_slice())
}

/// Create the session layer with `PostgreSQL` store.
///
/// The `tower_sessions.session` table is created by migration, not here.
///
/// # Errors
///
/// Returns an error if no signing key can be derived from the secret.
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> Result<SessionManagerLayer<PostgresStore, SignedCookie>, KeyError> {
    let store = PostgresStore::new(pool.clone());

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(config)?))
}

/// The visitor's cart, empty if none was stored.
///
/// A cart that no longer deserializes (e.g. after a schema change) is
/// discarded rather than failing the request.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn load_cart(session: &Session) -> Result<Cart, tower_sessions::session::Error> {
    match session.get::<Cart>(session_keys::CART).await {
        Ok(cart) => Ok(cart.unwrap_or_default()),
        Err(tower_sessions::session::Error::SerdeJson(e)) => {
            warn!(error = %e, "Discarding unreadable session cart");
            Ok(Cart::default())
        }
        Err(e) => Err(e),
    }
}

/// Persist the cart, removing the key entirely once it is empty.
///
/// # Errors
///
/// Returns an error if the session store cannot be written.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    if cart.is_empty() {
        session.remove::<Cart>(session_keys::CART).await?;
        return Ok(());
    }
    session.insert(session_keys::CART, cart).await
}

//! Lunaria storefront - public JSON API.
//!
//! Serves the catalog, cart, checkout, account, and blog endpoints and
//! receives Stripe webhooks. Migrations are applied by `ln-cli migrate`,
//! never on startup.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::error::Error;

use lunaria_storefront::config::StorefrontConfig;
use lunaria_storefront::state::AppState;
use lunaria_storefront::{app, db, init_sentry, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Configuration first: Sentry and log format depend on it
    let config = StorefrontConfig::from_env()?;

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.json_logs);
    if config.sentry.dsn.is_some() {
        tracing::info!("Sentry initialized");
    }

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    let addr = config.socket_addr();
    let state = AppState::new(config, pool)?;
    if !state.email().is_enabled() {
        tracing::warn!("SMTP not configured, transactional email is disabled");
    }

    let app = app(state)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("storefront listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

//! Database migration command.
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded at
//! build time. The storefront never runs them on startup.

use super::{CommandError, connect};

/// Apply pending storefront migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn storefront() -> Result<(), CommandError> {
    let pool = connect().await?;

    let migrator = sqlx::migrate!("../storefront/migrations");
    tracing::info!(available = migrator.iter().count(), "Running storefront migrations...");
    migrator.run(&pool).await?;

    tracing::info!("Storefront migrations complete");
    Ok(())
}

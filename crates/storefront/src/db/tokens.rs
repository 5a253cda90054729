//! One-time verification token storage.
//!
//! Tokens are stored by the hex SHA-256 of their value; the raw token only
//! ever exists in the email sent to the user.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use lunaria_core::{TokenPurpose, UserId};

use super::RepositoryError;

/// Repository for verification tokens.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new token hash, invalidating earlier unused tokens of the same
    /// purpose for the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        token_hash: &str,
        user_id: UserId,
        purpose: TokenPurpose,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM verification_tokens WHERE user_id = $1 AND purpose = $2 AND consumed_at IS NULL",
        )
        .bind(user_id.as_i64())
        .bind(purpose.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO verification_tokens (token_hash, user_id, purpose, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(token_hash)
        .bind(user_id.as_i64())
        .bind(purpose.as_str())
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Consume a token: marks it used and returns its owner, or `None` when
    /// the token is unknown, expired, already used, or of another purpose.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn consume(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<UserId>, RepositoryError> {
        let user_id: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE verification_tokens
            SET consumed_at = NOW()
            WHERE token_hash = $1
              AND purpose = $2
              AND consumed_at IS NULL
              AND expires_at > NOW()
            RETURNING user_id
            ",
        )
        .bind(token_hash)
        .bind(purpose.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(user_id.map(UserId::new))
    }
}

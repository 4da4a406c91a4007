//! Login token repository.
//!
//! At most one active token exists per email: issuing a new one removes the
//! previous tokens for that address along with every expired token.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crochet_core::{Email, MagicToken};

use super::RepositoryError;
use crate::models::LoginToken;

#[derive(sqlx::FromRow)]
struct LoginTokenRow {
    token: String,
    email: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

/// Repository for login token database operations.
pub struct LoginTokenRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> LoginTokenRepository<'a> {
    /// Create a new login token repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store `token` for `email`, replacing any earlier token for that email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the transaction fails.
    pub async fn issue(
        &self,
        token: &MagicToken,
        email: &Email,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM login_tokens WHERE email = ? OR expires_at <= ?")
            .bind(email.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO login_tokens (token, email, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token.as_str())
        .bind(email.as_str())
        .bind(expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Look up a token. Expiry is not checked here.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get(&self, token: &MagicToken) -> Result<Option<LoginToken>, RepositoryError> {
        let row = sqlx::query_as::<_, LoginTokenRow>(
            "SELECT token, email, expires_at, created_at FROM login_tokens WHERE token = ?",
        )
        .bind(token.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| {
            let email = Email::parse(&r.email).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in login token: {e}"))
            })?;
            Ok(LoginToken {
                token: MagicToken::from_stored(r.token),
                email,
                expires_at: r.expires_at,
                created_at: r.created_at,
            })
        })
        .transpose()
    }
}

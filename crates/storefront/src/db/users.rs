//! Admin user repository for database operations.

use chrono::Utc;
use sqlx::SqlitePool;

use crochet_core::UserId;

use super::{RepositoryError, map_unique_violation};
use crate::models::AdminUser;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
}

/// Repository for admin user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an admin with an already-hashed password.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<AdminUser, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "username"))?;

        Ok(AdminUser {
            id: UserId::new(result.last_insert_rowid()),
            username: username.to_owned(),
        })
    }

    /// Get an admin and their password hash by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        username: &str,
    ) -> Result<Option<(AdminUser, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| {
            (
                AdminUser {
                    id: UserId::new(r.id),
                    username: r.username,
                },
                r.password_hash,
            )
        }))
    }

    /// Get an admin by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<AdminUser>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash FROM users WHERE id = ?",
        )
        .bind(id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| AdminUser {
            id: UserId::new(r.id),
            username: r.username,
        }))
    }
}

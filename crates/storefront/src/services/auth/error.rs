//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (wrong password or unknown username).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Username already taken.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Username empty or otherwise unusable.
    #[error("invalid username: {0}")]
    InvalidUsername(String),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

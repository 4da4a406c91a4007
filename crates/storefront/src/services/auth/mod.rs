//! Authentication service.
//!
//! Admin accounts log in with a username and password hashed with Argon2id.

mod error;

pub use error::AuthError;

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sqlx::SqlitePool;

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::AdminUser;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length.
const MAX_USERNAME_LENGTH: usize = 64;

/// Hash verified when the username is unknown, so a failed login costs the
/// same whether or not the account exists.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("not-a-real-password").ok());

/// Authentication service.
///
/// Handles admin creation and password login.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Create an admin account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` or `AuthError::WeakPassword` if
    /// validation fails, `AuthError::UserAlreadyExists` if the username is taken.
    pub async fn create_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AdminUser, AuthError> {
        let username = validate_username(username)?;
        validate_password(password)?;

        let password_hash = hash_password(password)?;

        self.users
            .create(username, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the username is unknown or
    /// the password is wrong. Callers must not distinguish the two.
    pub async fn login(&self, username: &str, password: &str) -> Result<AdminUser, AuthError> {
        let Some((user, password_hash)) = self.users.get_credentials(username.trim()).await?
        else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            return Err(AuthError::InvalidCredentials);
        };

        verify_password(password, &password_hash)?;

        Ok(user)
    }
}

fn validate_username(username: &str) -> Result<&str, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidUsername(
            "username must not be empty".to_owned(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AuthError::InvalidUsername(format!(
            "username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }
    Ok(username)
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id with a random salt.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if the OS random source or the hasher fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|_| AuthError::PasswordHash)?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|_| AuthError::PasswordHash)?;
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

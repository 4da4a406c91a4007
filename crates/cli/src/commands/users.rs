//! Admin account management.

use secrecy::{ExposeSecret, SecretString};

use crochet_storefront::db;
use crochet_storefront::models::AdminUser;
use crochet_storefront::services::AuthService;

use super::CommandError;

/// Create an admin account in the database at `db_path`.
///
/// Pending migrations are applied first so a fresh file works.
///
/// # Errors
///
/// Returns `CommandError::Auth` for an invalid username, a short password, or
/// a taken username, and `CommandError::Database` if the file cannot be opened.
pub async fn add_user(
    db_path: &str,
    username: &str,
    password: &SecretString,
) -> Result<AdminUser, CommandError> {
    let pool = db::create_pool(db_path).await?;
    db::run_migrations(&pool).await?;

    let user = AuthService::new(&pool)
        .create_admin(username, password.expose_secret())
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Username: {}",
        user.id,
        user.username
    );

    pool.close().await;
    Ok(user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crochet_storefront::services::AuthError;

    use super::*;

    #[tokio::test]
    async fn test_add_user_then_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        let path = path.to_str().unwrap();
        let password = SecretString::from("long enough password");

        let user = add_user(path, "maker", &password).await.unwrap();
        assert_eq!(user.username, "maker");

        let err = add_user(path, "maker", &password).await.unwrap_err();
        assert!(matches!(err, CommandError::Auth(AuthError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");

        let err = add_user(
            path.to_str().unwrap(),
            "maker",
            &SecretString::from("short"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CommandError::Auth(AuthError::WeakPassword(_))));
    }
}

//! Application state shared across handlers.

use std::sync::Arc;

use sha2::{Digest, Sha512};
use sqlx::SqlitePool;
use tower_sessions::cookie::Key;
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::{ConfigError, StorefrontConfig};
use crate::middleware::{CsrfKey, RateLimiter};
use crate::services::{EmailService, ImageStore};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: SqlitePool,
    session_key: Key,
    csrf_key: CsrfKey,
    rate_limiter: RateLimiter,
    email: EmailService,
    images: ImageStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `SQLite` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if a configured key is not valid base64.
    pub fn new(config: StorefrontConfig, pool: SqlitePool) -> Result<Self, ConfigError> {
        // cookie::Key needs 64 bytes; stretch the configured key to that.
        let session_key = Key::from(Sha512::digest(config.session_key_bytes()?).as_slice());
        let csrf_key = CsrfKey::new(&config.csrf_key_bytes()?);
        let rate_limiter = RateLimiter::new(config.rate_limit_window);
        let email = EmailService::new(&config.base_url);
        let images = ImageStore::new(config.upload_dir.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                session_key,
                csrf_key,
                rate_limiter,
                email,
                images,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Session store over the same pool.
    #[must_use]
    pub fn session_store(&self) -> SqliteStore {
        SqliteStore::new(self.inner.pool.clone())
    }

    /// Key signing the session cookie.
    #[must_use]
    pub fn session_key(&self) -> Key {
        self.inner.session_key.clone()
    }

    #[must_use]
    pub fn csrf_key(&self) -> &CsrfKey {
        &self.inner.csrf_key
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    /// Mock email delivery.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Product photo storage.
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.inner.images
    }
}

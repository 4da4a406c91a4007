//! Session middleware configuration and flash messages.
//!
//! Sets up `SQLite`-backed sessions using tower-sessions, referenced by a
//! signed, HTTP-only cookie.

use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::StorefrontConfig;
use crate::models::{FlashMessage, session_keys};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "crochet_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer.
///
/// # Arguments
///
/// * `store` - `SQLite` session store; its table is created by the migrations
/// * `config` - Storefront configuration (cookie domain and secure flag)
/// * `key` - Cookie signing key
#[must_use]
pub fn create_session_layer(
    store: SqliteStore,
    config: &StorefrontConfig,
    key: Key,
) -> SessionManagerLayer<SqliteStore, SignedCookie> {
    let layer = SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.cookie_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key);

    match &config.cookie_domain {
        Some(domain) => layer.with_domain(domain.clone()),
        None => layer,
    }
}

/// Queue a flash message for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn push_flash(
    session: &Session,
    flash: FlashMessage,
) -> Result<(), tower_sessions::session::Error> {
    let mut flashes: Vec<FlashMessage> = session
        .get(session_keys::FLASHES)
        .await?
        .unwrap_or_default();
    flashes.push(flash);
    session.insert(session_keys::FLASHES, flashes).await
}

/// Remove and return all pending flash messages.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn take_flashes(
    session: &Session,
) -> Result<Vec<FlashMessage>, tower_sessions::session::Error> {
    Ok(session
        .remove::<Vec<FlashMessage>>(session_keys::FLASHES)
        .await?
        .unwrap_or_default())
}

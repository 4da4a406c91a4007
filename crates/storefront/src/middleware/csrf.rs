//! CSRF protection for form posts.
//!
//! Each session holds a random secret. Forms carry
//! `hex(HMAC-SHA256(CSRF_KEY, secret))` in a hidden `csrf_token` field.
//!
//! [`csrf_protect`] checks url-encoded POST bodies before any handler runs.
//! Multipart bodies are streamed to their handler untouched, and those
//! handlers call [`CsrfKey::verify_session`] on the field themselves.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{Method, StatusCode, header::CONTENT_TYPE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::session_keys;
use crate::state::AppState;

/// Name of the hidden form field.
pub const CSRF_FIELD: &str = "csrf_token";

/// Body of every CSRF rejection.
pub const CSRF_REJECTED_MESSAGE: &str = "Forbidden - CSRF token invalid";

const SECRET_BYTES: usize = 32;

/// Largest url-encoded form body buffered for the check.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Errors producing a CSRF token.
#[derive(Debug, Error)]
pub enum CsrfError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("random generation failed: {0}")]
    Random(String),

    #[error("invalid CSRF key")]
    Key,
}

/// Server-side key the per-session tokens are derived from.
#[derive(Clone)]
pub struct CsrfKey(Arc<[u8]>);

impl std::fmt::Debug for CsrfKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CsrfKey([REDACTED])")
    }
}

impl CsrfKey {
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }

    fn token_for(&self, secret: &str) -> Result<String, CsrfError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.0).map_err(|_| CsrfError::Key)?;
        mac.update(secret.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// The token for `session`, creating its secret on first use.
    ///
    /// # Errors
    ///
    /// Returns `CsrfError` if the session cannot be written or the system
    /// RNG fails.
    pub async fn session_token(&self, session: &Session) -> Result<String, CsrfError> {
        let secret = match session.get::<String>(session_keys::CSRF_SECRET).await? {
            Some(secret) => secret,
            None => {
                let mut bytes = [0u8; SECRET_BYTES];
                OsRng
                    .try_fill_bytes(&mut bytes)
                    .map_err(|e| CsrfError::Random(e.to_string()))?;
                let secret = hex::encode(bytes);
                session
                    .insert(session_keys::CSRF_SECRET, &secret)
                    .await?;
                secret
            }
        };
        self.token_for(&secret)
    }

    /// Whether `submitted` matches the token of `session`.
    ///
    /// A session without a secret never matches.
    ///
    /// # Errors
    ///
    /// Returns `CsrfError::Session` if the session cannot be read.
    pub async fn verify_session(
        &self,
        session: &Session,
        submitted: &str,
    ) -> Result<bool, CsrfError> {
        let Some(secret) = session.get::<String>(session_keys::CSRF_SECRET).await? else {
            return Ok(false);
        };
        let expected = self.token_for(&secret)?;
        Ok(constant_time_compare(&expected, submitted))
    }
}

/// Compare two strings in constant time to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Extractor yielding the CSRF token for the current session.
///
/// Page handlers pass it to their template.
pub struct CsrfToken(pub String);

impl FromRequestParts<AppState> for CsrfToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;
        let token = state
            .csrf_key()
            .session_token(session)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Self(token))
    }
}

/// The 403 response for a missing or wrong token.
#[must_use]
pub fn csrf_rejection() -> Response {
    (StatusCode::FORBIDDEN, CSRF_REJECTED_MESSAGE).into_response()
}

/// Reject POSTs whose url-encoded body lacks a valid `csrf_token`.
///
/// Multipart posts pass through for their handler to check. Any other POST
/// content type is rejected.
pub async fn csrf_protect(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        return next.run(request).await;
    }
    if !content_type.starts_with("application/x-www-form-urlencoded") {
        tracing::warn!(path = %request.uri().path(), %content_type, "Rejected POST with unexpected content type");
        return csrf_rejection();
    }

    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return AppError::Internal("session layer missing".to_owned()).into_response();
    };

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_FORM_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::PAYLOAD_TOO_LARGE, "Form too large").into_response(),
    };

    let submitted = url::form_urlencoded::parse(&bytes)
        .find(|(name, _)| name == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    match state.csrf_key().verify_session(&session, &submitted).await {
        Ok(true) => next.run(Request::from_parts(parts, Body::from(bytes))).await,
        Ok(false) => {
            tracing::warn!(path = %parts.uri.path(), "CSRF token mismatch");
            csrf_rejection()
        }
        Err(e) => AppError::Internal(e.to_string()).into_response(),
    }
}

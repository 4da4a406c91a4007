//! Admin authentication extractor and session helpers.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::session::push_flash;
use crate::models::{AdminUser, CurrentAdmin, FlashMessage, session_keys};

/// Flash shown when an anonymous visitor hits an admin page.
pub const LOGIN_REQUIRED_MESSAGE: &str = "You must be logged in to access this page.";

/// Extractor that requires a logged-in admin.
///
/// If nobody is logged in, a flash is queued and the request is redirected
/// to `/login`.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(RequireAdmin(admin): RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {}!", admin.username)
/// }
/// ```
pub struct RequireAdmin(pub CurrentAdmin);

/// Error returned when an admin page is requested without a login.
pub enum AuthRejection {
    /// Redirect to the login page.
    RedirectToLogin,
    /// The session layer is missing or the session could not be read.
    SessionUnavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/login").into_response(),
            Self::SessionUnavailable => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::SessionUnavailable)?;

        let authenticated = session
            .get::<bool>(session_keys::AUTHENTICATED)
            .await
            .map_err(|_| AuthRejection::SessionUnavailable)?
            .unwrap_or(false);

        let admin = if authenticated {
            session
                .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
                .await
                .map_err(|_| AuthRejection::SessionUnavailable)?
        } else {
            None
        };

        match admin {
            Some(admin) => Ok(Self(admin)),
            None => {
                push_flash(&session, FlashMessage::error(LOGIN_REQUIRED_MESSAGE))
                    .await
                    .map_err(|_| AuthRejection::SessionUnavailable)?;
                Err(AuthRejection::RedirectToLogin)
            }
        }
    }
}

/// Mark the session as belonging to `user`.
///
/// The session ID is cycled first so a pre-login ID cannot be fixated.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    user: &AdminUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::AUTHENTICATED, true).await?;
    session
        .insert(
            session_keys::CURRENT_ADMIN,
            CurrentAdmin {
                id: user.id,
                username: user.username.clone(),
            },
        )
        .await
}

/// Log out: delete the session record and expire the cookie.
///
/// # Errors
///
/// Returns an error if the session record cannot be deleted.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

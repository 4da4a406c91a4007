//! Admin login and logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::Response,
};
use serde::Deserialize;
use tower_sessions::Session;

use super::flash_redirect;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{CsrfToken, clear_current_admin, set_current_admin, take_flashes};
use crate::models::FlashMessage;
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// Shown for an unknown username and for a wrong password alike.
const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub flashes: Vec<FlashMessage>,
    pub csrf_token: String,
}

/// Display the login page.
pub async fn login_page(
    session: Session,
    CsrfToken(csrf_token): CsrfToken,
) -> Result<LoginTemplate> {
    Ok(LoginTemplate {
        flashes: take_flashes(&session).await?,
        csrf_token,
    })
}

/// Handle login form submission.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let user = match AuthService::new(state.pool())
        .login(form.username.trim(), &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Failed admin login");
            return flash_redirect(
                &session,
                FlashMessage::error(INVALID_CREDENTIALS_MESSAGE),
                "/login",
            )
            .await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Admin login failed");
            return flash_redirect(
                &session,
                FlashMessage::error("Internal Server Error"),
                "/login",
            )
            .await;
        }
    };

    set_current_admin(&session, &user).await?;
    set_sentry_user(&user.id, &user.username);
    tracing::info!(user_id = %user.id, "Admin logged in");

    flash_redirect(
        &session,
        FlashMessage::success(format!("Welcome, {}!", user.username)),
        "/admin",
    )
    .await
}

/// Log out and return to the login page.
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_admin(&session).await?;
    clear_sentry_user();

    flash_redirect(
        &session,
        FlashMessage::success("Logged out successfully!"),
        "/login",
    )
    .await
}

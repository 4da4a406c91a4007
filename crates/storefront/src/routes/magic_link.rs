//! "My orders" link request and listing.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

use super::flash_redirect;
use crate::error::Result;
use crate::filters;
use crate::middleware::{CsrfToken, take_flashes};
use crate::models::{FlashMessage, Order};
use crate::services::{MagicLinkError, MagicLinkService};
use crate::state::AppState;

const STATUS_REQUEST_PATH: &str = "/status-request";

/// Status-link request form.
#[derive(Debug, Deserialize)]
pub struct StatusRequestForm {
    #[serde(default)]
    pub email: String,
}

/// Query for the orders listing.
#[derive(Debug, Deserialize)]
pub struct MyOrdersQuery {
    #[serde(default)]
    pub token: String,
}

/// Email form for a status link.
#[derive(Template, WebTemplate)]
#[template(path = "status_request.html")]
pub struct StatusRequestTemplate {
    pub flashes: Vec<FlashMessage>,
    pub csrf_token: String,
}

/// Every order placed with one email.
#[derive(Template, WebTemplate)]
#[template(path = "my_orders.html")]
pub struct MyOrdersTemplate {
    pub flashes: Vec<FlashMessage>,
    pub email: String,
    pub orders: Vec<Order>,
}

/// Show the email form.
pub async fn request_form(
    session: Session,
    CsrfToken(csrf_token): CsrfToken,
) -> Result<StatusRequestTemplate> {
    Ok(StatusRequestTemplate {
        flashes: take_flashes(&session).await?,
        csrf_token,
    })
}

/// Send a status link if the email has orders.
///
/// The outcome message does not depend on whether it had any.
pub async fn request_link(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<StatusRequestForm>,
) -> Result<Response> {
    let service = MagicLinkService::new(state.pool(), state.email());
    let flash = match service.request_status_link(&form.email, Utc::now()).await {
        Ok(message) => FlashMessage::success(message),
        Err(MagicLinkError::InvalidEmail(_)) => {
            FlashMessage::error("Please enter a valid email address.")
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to issue status link");
            FlashMessage::error("Internal Error processing your request.")
        }
    };
    flash_redirect(&session, flash, STATUS_REQUEST_PATH).await
}

/// List the orders of a login token's email.
pub async fn my_orders(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<MyOrdersQuery>,
) -> Result<Response> {
    let service = MagicLinkService::new(state.pool(), state.email());
    let message = match service.orders_for_login_token(&query.token, Utc::now()).await {
        Ok(mine) => {
            return Ok(MyOrdersTemplate {
                flashes: take_flashes(&session).await?,
                email: mine.email.into_inner(),
                orders: mine.orders,
            }
            .into_response());
        }
        Err(MagicLinkError::MissingToken) => "Missing access token.",
        Err(MagicLinkError::InvalidToken) => "Invalid or Expired Link. Please request a new one.",
        Err(e) => {
            tracing::error!(error = %e, "Failed to list orders for login token");
            "Error fetching your orders."
        }
    };
    flash_redirect(&session, FlashMessage::error(message), STATUS_REQUEST_PATH).await
}

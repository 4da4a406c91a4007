//! Customer order pages.
//!
//! Everything after checkout is reached through the order's magic token.
//! Bad or unknown tokens always end at `/status-request` with a generic
//! message so the pages reveal nothing about which tokens exist.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

use crochet_core::ItemId;

use super::{errors_redirect, flash_redirect};
use crate::db::ItemRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CsrfToken, take_flashes};
use crate::models::{FlashMessage, Item, Order};
use crate::services::{CustomerForm, OrderError, OrderService};
use crate::state::AppState;

const STATUS_REQUEST_PATH: &str = "/status-request";
const EXPIRED_MESSAGE: &str = "Link Expired. Please request a new one.";

fn status_path(token: &str) -> String {
    format!("/order/status/{token}")
}

// =============================================================================
// Form and Query Types
// =============================================================================

/// Query for the order form.
#[derive(Debug, Deserialize)]
pub struct OrderFormQuery {
    #[serde(default)]
    pub id: String,
}

/// Checkout form.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderForm {
    #[serde(default)]
    pub item_id: String,
    #[serde(flatten)]
    pub customer: CustomerForm,
}

/// Edit form. Carries the token instead of the item.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderForm {
    #[serde(default)]
    pub token: String,
    #[serde(flatten)]
    pub customer: CustomerForm,
}

/// Cancel form.
#[derive(Debug, Deserialize)]
pub struct CancelOrderForm {
    #[serde(default)]
    pub token: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Checkout page for one item.
#[derive(Template, WebTemplate)]
#[template(path = "order.html")]
pub struct OrderFormTemplate {
    pub flashes: Vec<FlashMessage>,
    pub csrf_token: String,
    pub item: Item,
}

/// Order status page.
#[derive(Template, WebTemplate)]
#[template(path = "order_status.html")]
pub struct OrderStatusTemplate {
    pub flashes: Vec<FlashMessage>,
    pub csrf_token: String,
    pub order: Order,
}

/// Order edit page.
#[derive(Template, WebTemplate)]
#[template(path = "order_edit.html")]
pub struct OrderEditTemplate {
    pub flashes: Vec<FlashMessage>,
    pub csrf_token: String,
    pub order: Order,
}

// =============================================================================
// Handlers
// =============================================================================

/// Show the checkout form for `?id=`.
pub async fn order_form(
    State(state): State<AppState>,
    session: Session,
    CsrfToken(csrf_token): CsrfToken,
    Query(query): Query<OrderFormQuery>,
) -> Result<OrderFormTemplate> {
    let id = query
        .id
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("Invalid Item ID".to_owned()))?;

    let item = ItemRepository::new(state.pool())
        .get_by_id(ItemId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_owned()))?;

    Ok(OrderFormTemplate {
        flashes: take_flashes(&session).await?,
        csrf_token,
        item,
    })
}

/// Place an order and go straight to its status page.
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PlaceOrderForm>,
) -> Result<Response> {
    let Ok(id) = form.item_id.trim().parse::<i64>() else {
        return flash_redirect(&session, FlashMessage::error("Invalid item ID."), "/").await;
    };
    let form_path = format!("/order?id={id}");

    let service = OrderService::new(state.pool(), state.email());
    match service
        .place_order(ItemId::new(id), &form.customer, Utc::now())
        .await
    {
        Ok(order) => {
            flash_redirect(
                &session,
                FlashMessage::success("Order placed successfully! Check your email for details."),
                &status_path(order.magic_token.as_str()),
            )
            .await
        }
        Err(OrderError::Validation(errors)) => errors_redirect(&session, errors, &form_path).await,
        Err(OrderError::ItemUnavailable) => {
            flash_redirect(
                &session,
                FlashMessage::error("This item is not available for ordering."),
                "/",
            )
            .await
        }
        Err(e) => {
            tracing::error!(error = %e, item_id = id, "Failed to place order");
            flash_redirect(
                &session,
                FlashMessage::error("Failed to place order. Please try again."),
                &form_path,
            )
            .await
        }
    }
}

/// Show one order by its magic token.
pub async fn order_status(
    State(state): State<AppState>,
    session: Session,
    CsrfToken(csrf_token): CsrfToken,
    Path(token): Path<String>,
) -> Result<Response> {
    let service = OrderService::new(state.pool(), state.email());
    let order = match service.order_by_token(&token, Utc::now()).await {
        Ok(order) => order,
        Err(OrderError::NotFound) => {
            return flash_redirect(
                &session,
                FlashMessage::error("Order not found or link is invalid."),
                STATUS_REQUEST_PATH,
            )
            .await;
        }
        Err(OrderError::Expired) => {
            return flash_redirect(
                &session,
                FlashMessage::error(EXPIRED_MESSAGE),
                STATUS_REQUEST_PATH,
            )
            .await;
        }
        Err(e) => return Err(e.into()),
    };

    Ok(OrderStatusTemplate {
        flashes: take_flashes(&session).await?,
        csrf_token,
        order,
    }
    .into_response())
}

/// Show the edit form while the order is still `Ordered`.
pub async fn edit_form(
    State(state): State<AppState>,
    session: Session,
    CsrfToken(csrf_token): CsrfToken,
    Path(token): Path<String>,
) -> Result<Response> {
    let service = OrderService::new(state.pool(), state.email());
    match service.editable_order(&token, Utc::now()).await {
        Ok(order) => Ok(OrderEditTemplate {
            flashes: take_flashes(&session).await?,
            csrf_token,
            order,
        }
        .into_response()),
        Err(e) => customer_error(&session, e, &token, "This order cannot be edited anymore.").await,
    }
}

/// Apply the customer's edit.
pub async fn update_order(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateOrderForm>,
) -> Result<Response> {
    let token = form.token.trim();
    let service = OrderService::new(state.pool(), state.email());

    match service.update_order(token, &form.customer, Utc::now()).await {
        Ok(_) => {
            flash_redirect(
                &session,
                FlashMessage::success("Order updated successfully!"),
                &status_path(token),
            )
            .await
        }
        Err(OrderError::Validation(errors)) => {
            errors_redirect(&session, errors, &format!("/order/edit/{token}")).await
        }
        Err(e) => customer_error(&session, e, token, "This order cannot be edited.").await,
    }
}

/// Cancel the order.
pub async fn cancel_order(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CancelOrderForm>,
) -> Result<Response> {
    let token = form.token.trim();
    let service = OrderService::new(state.pool(), state.email());

    match service.cancel_order(token, Utc::now()).await {
        Ok(()) => {
            flash_redirect(
                &session,
                FlashMessage::success("Order cancelled successfully."),
                &status_path(token),
            )
            .await
        }
        Err(e) => customer_error(&session, e, token, "This order cannot be cancelled.").await,
    }
}

/// Turn a token-lookup failure into a flash and redirect.
///
/// `locked_message` is shown on the status page when the order has left
/// `Ordered`. The token has been validated by then, so it is safe to echo
/// into the redirect.
async fn customer_error(
    session: &Session,
    error: OrderError,
    token: &str,
    locked_message: &str,
) -> Result<Response> {
    match error {
        OrderError::NotFound => {
            flash_redirect(
                session,
                FlashMessage::error("Order not found."),
                STATUS_REQUEST_PATH,
            )
            .await
        }
        OrderError::Expired => {
            flash_redirect(
                session,
                FlashMessage::error(EXPIRED_MESSAGE),
                STATUS_REQUEST_PATH,
            )
            .await
        }
        OrderError::NotEditable => {
            flash_redirect(
                session,
                FlashMessage::error(locked_message),
                &status_path(token),
            )
            .await
        }
        other => {
            tracing::error!(error = %other, "Order request failed");
            Err(other.into())
        }
    }
}

//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                          - Public item catalog
//! GET  /health                    - Liveness check
//! GET  /health/ready              - Database readiness check
//!
//! # Orders (customer, magic link)
//! GET  /order?id=                 - Order form for an item
//! POST /order                     - Place order (rate limited)
//! GET  /order/status/{token}      - View an order
//! GET  /order/edit/{token}        - Edit form
//! POST /order/update              - Apply edit (rate limited)
//! POST /order/cancel              - Cancel (rate limited)
//!
//! # My orders (login token)
//! GET  /status-request            - Email form
//! POST /status-request            - Send status link (rate limited)
//! GET  /my-orders?token=          - Every order for the token's email
//!
//! # Admin auth
//! GET  /login                     - Login page
//! POST /login                     - Login action
//! GET  /logout                    - Logout action
//!
//! # Admin (requires login)
//! GET  /admin                     - Dashboard
//! GET  /admin/orders?page=&limit= - Paginated orders
//! POST /admin/orders/update       - Set status and comments
//! GET  /admin/items               - All items
//! POST /admin/items               - Create item (multipart)
//! GET  /admin/items/new           - New item form
//! GET  /admin/items/edit?id=      - Edit item form
//! POST /admin/items/update        - Update item (multipart)
//! POST /admin/items/delete        - Delete item
//! ```
//!
//! Every POST carries a `csrf_token` field.

pub mod admin;
pub mod auth;
pub mod health;
pub mod home;
pub mod magic_link;
pub mod orders;

use axum::{
    Router,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_sessions::Session;

use crate::error::Result;
use crate::middleware::{push_flash, rate_limit};
use crate::models::FlashMessage;
use crate::state::AppState;

/// Create the public customer routes.
///
/// The form posts are rate limited per client address.
pub fn customer_routes(state: &AppState) -> Router<AppState> {
    let rate_limited = Router::new()
        .route("/order", post(orders::place_order))
        .route("/order/update", post(orders::update_order))
        .route("/order/cancel", post(orders::cancel_order))
        .route("/status-request", post(magic_link::request_link))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/", get(home::index))
        .route("/order", get(orders::order_form))
        .route("/order/status/{token}", get(orders::order_status))
        .route("/order/edit/{token}", get(orders::edit_form))
        .route("/status-request", get(magic_link::request_form))
        .route("/my-orders", get(magic_link::my_orders))
        .merge(rate_limited)
}

/// Create the admin login routes.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
}

/// Create all routes.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .merge(customer_routes(state))
        .merge(auth_routes())
        .merge(admin::routes())
}

/// Queue `flash` and redirect to `to` with 303 See Other.
pub(crate) async fn flash_redirect(
    session: &Session,
    flash: FlashMessage,
    to: &str,
) -> Result<Response> {
    push_flash(session, flash).await?;
    Ok(Redirect::to(to).into_response())
}

/// Queue one error flash per message and redirect to `to`.
pub(crate) async fn errors_redirect(
    session: &Session,
    errors: Vec<String>,
    to: &str,
) -> Result<Response> {
    for error in errors {
        push_flash(session, FlashMessage::error(error)).await?;
    }
    Ok(Redirect::to(to).into_response())
}

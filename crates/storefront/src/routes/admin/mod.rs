//! Admin panel routes.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin), so
//! anonymous requests are redirected to `/login`.

pub mod dashboard;
pub mod items;
pub mod orders;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::services::images::MAX_UPLOAD_BYTES;
use crate::state::AppState;

/// Multipart overhead allowed on top of the photo itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    let upload_limit = DefaultBodyLimit::max(MAX_UPLOAD_BYTES + FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/admin", get(dashboard::dashboard))
        .route("/admin/orders", get(orders::list))
        .route("/admin/orders/update", post(orders::update_status))
        .route(
            "/admin/items",
            get(items::list).post(items::create).layer(upload_limit),
        )
        .route("/admin/items/new", get(items::new_form))
        .route("/admin/items/edit", get(items::edit_form))
        .route(
            "/admin/items/update",
            post(items::update).layer(upload_limit),
        )
        .route("/admin/items/delete", post(items::delete))
}

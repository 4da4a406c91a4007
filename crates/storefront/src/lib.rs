//! Crochet storefront library.
//!
//! The public catalog, magic-link order access, and the admin panel, built
//! as a library so the binary and the integration tests share one router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, middleware as axum_middleware};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the complete application router.
///
/// Static files are served outside the session and CSRF layers.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(
        state.session_store(),
        state.config(),
        state.session_key(),
    );
    let static_dir = state.config().static_dir.clone();

    routes::routes(&state)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::csrf_protect,
        ))
        .layer(session_layer)
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(axum_middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Security headers
//! 4. Session layer (tower-sessions with the `SQLite` store)
//! 5. CSRF check on form posts
//! 6. Rate limiting (customer form posts only)

pub mod auth;
pub mod csrf;
pub mod rate_limit;
pub mod security_headers;
pub mod session;

pub use auth::{RequireAdmin, clear_current_admin, set_current_admin};
pub use csrf::{CSRF_FIELD, CsrfKey, CsrfToken, csrf_protect, csrf_rejection};
pub use rate_limit::{RateLimiter, rate_limit, spawn_sweeper};
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, push_flash, take_flashes};

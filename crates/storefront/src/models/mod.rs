//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod item;
pub mod login_token;
pub mod order;
pub mod session;
pub mod stats;
pub mod user;

pub use item::{Item, ItemInput};
pub use login_token::LoginToken;
pub use order::{CustomerDetails, NewOrder, Order};
pub use session::{CurrentAdmin, FlashKind, FlashMessage, session_keys};
pub use stats::{DashboardStats, ItemOrderCount, StatusCount};
pub use user::AdminUser;

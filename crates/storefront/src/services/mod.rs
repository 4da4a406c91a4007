//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Admin password authentication
//! - `email` - Mock email delivery (logged, never sent)
//! - `images` - Product photo decoding, resizing, and storage
//! - `items` - Catalog form validation
//! - `magic_link` - Passwordless "my orders" links
//! - `orders` - Order lifecycle

pub mod auth;
pub mod email;
pub mod images;
pub mod items;
pub mod magic_link;
pub mod orders;

pub use auth::{AuthError, AuthService};
pub use email::EmailService;
pub use images::{ImageError, ImageStore};
pub use items::{ItemError, ItemForm};
pub use magic_link::{MagicLinkError, MagicLinkService};
pub use orders::{CustomerForm, OrderError, OrderService};

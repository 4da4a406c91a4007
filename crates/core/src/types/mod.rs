//! Core types for the crochet storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod status;
pub mod token;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Price, PriceError};
pub use status::*;
pub use token::{
    MagicToken, ORDER_REF_ALPHABET, ORDER_REF_LENGTH, OrderRef, TOKEN_BYTES, TokenError,
    generate_order_ref, generate_token,
};

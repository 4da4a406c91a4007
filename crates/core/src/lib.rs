//! Crochet Core - Shared domain types.
//!
//! This crate provides the types used across the crochet storefront components:
//! - `storefront` - Public shop, magic-link order access, and admin panel
//! - `cli` - Command-line tools for migrations and admin seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O beyond the
//! operating system's random source, no database access, no HTTP. This keeps
//! it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, statuses, and tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

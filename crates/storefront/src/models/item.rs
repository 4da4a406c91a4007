//! Catalog item types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crochet_core::{ItemId, ItemStatus, Price};

/// A catalog item.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub price: Price,
    /// Free text such as "2-3 weeks".
    pub delivery_time: String,
    /// Public URL of the product photo, empty when none was uploaded.
    pub image_url: String,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Whether customers can currently order this item.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        self.status.is_orderable()
    }
}

/// Validated fields for creating or updating an item.
///
/// `image_url` is `None` on update when the existing photo should be kept.
#[derive(Debug, Clone)]
pub struct ItemInput {
    pub title: String,
    pub description: String,
    pub price: Price,
    pub delivery_time: String,
    pub status: ItemStatus,
    pub image_url: Option<String>,
}

//! Order domain types.

use chrono::{DateTime, Utc};

use crochet_core::{Email, ItemId, MagicToken, OrderId, OrderRef, OrderStatus};

/// Shown in place of the title when the ordered item has since been deleted.
pub const DELETED_ITEM_TITLE: &str = "Item no longer available";

/// A customer order, joined with the title and photo of its item.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub order_ref: OrderRef,
    pub item_id: ItemId,
    /// `None` when the item has been deleted.
    pub item_title: Option<String>,
    pub item_image_url: Option<String>,
    pub quantity: u32,
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_address: String,
    pub notes: String,
    pub status: OrderStatus,
    /// Internal note. Never rendered on customer pages.
    pub admin_comments: String,
    pub magic_token: MagicToken,
    pub magic_token_expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Title to display, falling back to a placeholder for deleted items.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.item_title.as_deref().unwrap_or(DELETED_ITEM_TITLE)
    }

    /// The magic link stops working at its expiry instant.
    #[must_use]
    pub fn is_link_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.magic_token_expiry
    }

    /// Whether the customer may still edit or cancel.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        self.status.is_customer_editable()
    }
}

/// Validated customer-supplied fields, shared by checkout and edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerDetails {
    pub name: String,
    pub email: Email,
    pub address: String,
    pub quantity: u32,
    pub notes: String,
}

/// Everything needed to insert a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_ref: OrderRef,
    pub item_id: ItemId,
    pub details: CustomerDetails,
    pub magic_token: MagicToken,
    pub magic_token_expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

//! Status enums for items and orders.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Catalog visibility of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Listed and orderable.
    #[default]
    Available,
    /// Listed but cannot be ordered.
    OutOfStock,
    /// Hidden from the public catalog.
    Archived,
}

impl ItemStatus {
    /// Every status, in the order the admin form lists them.
    pub const ALL: [Self; 3] = [Self::Available, Self::OutOfStock, Self::Archived];

    /// The stored/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::OutOfStock => "out_of_stock",
            Self::Archived => "archived",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::OutOfStock => "Out of stock",
            Self::Archived => "Archived",
        }
    }

    /// Whether customers may place orders for an item with this status.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "out_of_stock" => Ok(Self::OutOfStock),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("invalid item status: {s}")),
        }
    }
}

/// Order status.
///
/// Customers only ever move an order from `Ordered` to `Cancelled`. Admins may
/// set any status, including free-form ones kept verbatim in [`Self::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum OrderStatus {
    Ordered,
    InProgress,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    /// Admin-defined status outside the standard set.
    Other(String),
}

impl OrderStatus {
    /// The standard statuses offered to admins.
    pub const STANDARD: [Self; 6] = [
        Self::Ordered,
        Self::InProgress,
        Self::Shipped,
        Self::Delivered,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Parse a stored or submitted status.
    ///
    /// Returns `None` for blank input. Unknown values become [`Self::Other`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        Some(match s {
            "Ordered" => Self::Ordered,
            "In Progress" => Self::InProgress,
            "Shipped" => Self::Shipped,
            "Delivered" => Self::Delivered,
            "Completed" => Self::Completed,
            "Cancelled" => Self::Cancelled,
            other => Self::Other(other.to_owned()),
        })
    }

    /// The stored representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ordered => "Ordered",
            Self::InProgress => "In Progress",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Other(s) => s,
        }
    }

    /// Whether the customer may still edit or cancel the order.
    #[must_use]
    pub const fn is_customer_editable(&self) -> bool {
        matches!(self, Self::Ordered)
    }

    /// CSS-friendly slug for status badges.
    #[must_use]
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Ordered => "ordered",
            Self::InProgress => "in-progress",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Other(_) => "other",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        Self::parse(&s).unwrap_or(Self::Other(s))
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

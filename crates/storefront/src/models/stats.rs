//! Admin dashboard aggregates.

/// Number of orders in one status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Number of orders placed for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOrderCount {
    pub title: String,
    pub count: i64,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub total_items: i64,
    pub total_orders: i64,
    pub orders_by_status: Vec<StatusCount>,
    /// Sorted by order count, busiest first.
    pub orders_by_item: Vec<ItemOrderCount>,
}

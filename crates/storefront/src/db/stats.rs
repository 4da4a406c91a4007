//! Aggregate queries for the admin dashboard.

use sqlx::SqlitePool;

use super::RepositoryError;
use crate::models::{DashboardStats, ItemOrderCount, StatusCount};

/// Repository for dashboard statistics.
pub struct StatsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StatsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Compute the dashboard numbers.
    ///
    /// Items with no orders still appear in the per-item breakdown with a
    /// count of zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn dashboard(&self) -> Result<DashboardStats, RepositoryError> {
        let total_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(self.pool)
            .await?;
        let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(self.pool)
            .await?;

        let orders_by_status = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY COUNT(*) DESC, status",
        )
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();

        let orders_by_item = sqlx::query_as::<_, (String, i64)>(
            "SELECT i.title, COUNT(o.id) AS order_count
             FROM items i
             LEFT JOIN orders o ON o.item_id = i.id
             GROUP BY i.id, i.title
             ORDER BY order_count DESC, i.title",
        )
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|(title, count)| ItemOrderCount { title, count })
        .collect();

        Ok(DashboardStats {
            total_items,
            total_orders,
            orders_by_status,
            orders_by_item,
        })
    }
}

//! Order repository for database operations.
//!
//! Customer-side mutations are conditional on `status = 'Ordered'` so the
//! database decides races between an edit, a cancel, and an admin update.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crochet_core::{Email, ItemId, MagicToken, OrderId, OrderRef, OrderStatus};

use super::{RepositoryError, map_unique_violation};
use crate::models::{CustomerDetails, NewOrder, Order};

const ORDER_SELECT: &str = "
    SELECT o.id, o.order_ref, o.item_id, i.title AS item_title, i.image_url AS item_image_url,
           o.quantity, o.customer_name, o.customer_email, o.customer_address, o.notes,
           o.status, o.admin_comments, o.magic_token, o.magic_token_expiry,
           o.created_at, o.updated_at
    FROM orders o
    LEFT JOIN items i ON i.id = o.item_id";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_ref: String,
    item_id: i64,
    item_title: Option<String>,
    item_image_url: Option<String>,
    quantity: i64,
    customer_name: String,
    customer_email: String,
    customer_address: String,
    notes: String,
    status: String,
    admin_comments: String,
    magic_token: String,
    magic_token_expiry: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let customer_email = Email::parse(&row.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in order {}: {e}", row.id))
        })?;
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("invalid quantity in order {}", row.id))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            order_ref: OrderRef::from_stored(row.order_ref),
            item_id: ItemId::new(row.item_id),
            item_title: row.item_title,
            item_image_url: row.item_image_url,
            quantity,
            customer_name: row.customer_name,
            customer_email,
            customer_address: row.customer_address,
            notes: row.notes,
            status: OrderStatus::from(row.status),
            admin_comments: row.admin_comments,
            magic_token: MagicToken::from_stored(row.magic_token),
            magic_token_expiry: row.magic_token_expiry,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn collect(rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
    rows.into_iter().map(Order::try_from).collect()
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new order with status `Ordered`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order ref or magic token is
    /// already taken; the caller should regenerate both and retry.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let details = &order.details;
        let result = sqlx::query(
            "INSERT INTO orders (
                order_ref, item_id, quantity, customer_name, customer_email, customer_address,
                notes, status, magic_token, magic_token_expiry, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.order_ref.as_str())
        .bind(order.item_id.as_i64())
        .bind(i64::from(details.quantity))
        .bind(&details.name)
        .bind(details.email.as_str())
        .bind(&details.address)
        .bind(&details.notes)
        .bind(OrderStatus::Ordered.as_str())
        .bind(order.magic_token.as_str())
        .bind(order.magic_token_expiry)
        .bind(order.created_at)
        .bind(order.created_at)
        .execute(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "order reference or token"))?;

        Ok(OrderId::new(result.last_insert_rowid()))
    }

    /// Get an order by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.id = ?"))
            .bind(id.as_i64())
            .fetch_optional(self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }

    /// Get an order by its magic link token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_token(&self, token: &MagicToken) -> Result<Option<Order>, RepositoryError> {
        let row =
            sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.magic_token = ?"))
                .bind(token.as_str())
                .fetch_optional(self.pool)
                .await?;
        row.map(Order::try_from).transpose()
    }

    /// All orders placed with `email`, newest first. Case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_email(&self, email: &Email) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} WHERE LOWER(o.customer_email) = LOWER(?) ORDER BY o.created_at DESC, o.id DESC"
        ))
        .bind(email.as_str())
        .fetch_all(self.pool)
        .await?;
        collect(rows)
    }

    /// Number of orders placed with `email`. Case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_email(&self, email: &Email) -> Result<i64, RepositoryError> {
        let count =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE LOWER(customer_email) = LOWER(?)")
                .bind(email.as_str())
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Overwrite the customer fields while the order is still `Ordered`.
    ///
    /// Returns `false` if the order does not exist or has left `Ordered`.
    /// Status and token expiry are never touched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_customer_details(
        &self,
        id: OrderId,
        details: &CustomerDetails,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders
             SET customer_name = ?, customer_email = ?, customer_address = ?,
                 quantity = ?, notes = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(&details.name)
        .bind(details.email.as_str())
        .bind(&details.address)
        .bind(i64::from(details.quantity))
        .bind(&details.notes)
        .bind(now)
        .bind(id.as_i64())
        .bind(OrderStatus::Ordered.as_str())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move an `Ordered` order to `Cancelled`.
    ///
    /// Returns `false` if the order does not exist or has left `Ordered`, so
    /// of two concurrent cancels exactly one gets `true`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn cancel(&self, id: OrderId, now: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(OrderStatus::Cancelled.as_str())
                .bind(now)
                .bind(id.as_i64())
                .bind(OrderStatus::Ordered.as_str())
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Admin override: set status and internal comments whatever the current status.
    ///
    /// Returns `false` if no order has this ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        status: &OrderStatus,
        admin_comments: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?, admin_comments = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(admin_comments)
        .bind(now)
        .bind(id.as_i64())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Replace an order's magic token and expiry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a token collision.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn refresh_token(
        &self,
        id: OrderId,
        token: &MagicToken,
        expiry: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET magic_token = ?, magic_token_expiry = ? WHERE id = ?")
            .bind(token.as_str())
            .bind(expiry)
            .bind(id.as_i64())
            .execute(self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "magic token"))?;
        Ok(())
    }

    /// One page of all orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_page(&self, limit: i64, offset: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} ORDER BY o.created_at DESC, o.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        collect(rows)
    }

    /// Total number of orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_all(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Duration;
    use crochet_core::{ItemStatus, generate_order_ref, generate_token};

    use super::*;
    use crate::db::ItemRepository;
    use crate::db::items::tests::sample_input;
    use crate::db::test_support::migrated_pool;

    pub fn details(name: &str, email: &str) -> CustomerDetails {
        CustomerDetails {
            name: name.to_owned(),
            email: Email::parse(email).unwrap(),
            address: "123 Main St".to_owned(),
            quantity: 2,
            notes: String::new(),
        }
    }

    pub fn new_order(item_id: ItemId, email: &str, now: DateTime<Utc>) -> NewOrder {
        NewOrder {
            order_ref: generate_order_ref().unwrap(),
            item_id,
            details: details("Alice", email),
            magic_token: generate_token().unwrap(),
            magic_token_expiry: now + Duration::days(30),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_token() {
        let (pool, _dir) = migrated_pool().await;
        let now = Utc::now();
        let item_id = ItemRepository::new(&pool)
            .create(&sample_input("Bunny", ItemStatus::Available), now)
            .await
            .unwrap();
        let repo = OrderRepository::new(&pool);

        let new = new_order(item_id, "alice@example.com", now);
        let id = repo.create(&new).await.unwrap();

        let order = repo.get_by_token(&new.magic_token).await.unwrap().unwrap();
        assert_eq!(order.id, id);
        assert_eq!(order.status, OrderStatus::Ordered);
        assert_eq!(order.quantity, 2);
        assert_eq!(order.item_title.as_deref(), Some("Bunny"));
        assert_eq!(order.magic_token_expiry, new.magic_token_expiry);
    }

    #[tokio::test]
    async fn test_duplicate_ref_is_conflict() {
        let (pool, _dir) = migrated_pool().await;
        let repo = OrderRepository::new(&pool);
        let now = Utc::now();

        let first = new_order(ItemId::new(1), "alice@example.com", now);
        repo.create(&first).await.unwrap();

        let mut second = new_order(ItemId::new(1), "bob@example.com", now);
        second.order_ref = first.order_ref.clone();
        let result = repo.create(&second).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_deleted_item_leaves_order_readable() {
        let (pool, _dir) = migrated_pool().await;
        let now = Utc::now();
        let items = ItemRepository::new(&pool);
        let item_id = items
            .create(&sample_input("Bunny", ItemStatus::Available), now)
            .await
            .unwrap();
        let repo = OrderRepository::new(&pool);
        let id = repo
            .create(&new_order(item_id, "alice@example.com", now))
            .await
            .unwrap();

        items.delete(item_id).await.unwrap();

        let order = repo.get_by_id(id).await.unwrap().unwrap();
        assert!(order.item_title.is_none());
        assert_eq!(order.display_title(), crate::models::order::DELETED_ITEM_TITLE);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let (pool, _dir) = migrated_pool().await;
        let repo = OrderRepository::new(&pool);
        let now = Utc::now();
        repo.create(&new_order(ItemId::new(1), "alice@example.com", now))
            .await
            .unwrap();
        // Rows written before emails were normalized may carry mixed case.
        sqlx::query("UPDATE orders SET customer_email = 'Alice@Example.com'")
            .execute(&pool)
            .await
            .unwrap();

        let email = Email::parse("ALICE@example.COM").unwrap();
        assert_eq!(repo.count_by_email(&email).await.unwrap(), 1);
        assert_eq!(repo.list_by_email(&email).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_updates_only_apply_while_ordered() {
        let (pool, _dir) = migrated_pool().await;
        let repo = OrderRepository::new(&pool);
        let now = Utc::now();
        let id = repo
            .create(&new_order(ItemId::new(1), "alice@example.com", now))
            .await
            .unwrap();

        assert!(repo.cancel(id, now).await.unwrap());
        assert!(!repo.cancel(id, now).await.unwrap());
        assert!(
            !repo
                .update_customer_details(id, &details("Mallory", "m@example.com"), now)
                .await
                .unwrap()
        );

        let order = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.customer_name, "Alice");
    }

    #[tokio::test]
    async fn test_admin_update_ignores_lock() {
        let (pool, _dir) = migrated_pool().await;
        let repo = OrderRepository::new(&pool);
        let now = Utc::now();
        let id = repo
            .create(&new_order(ItemId::new(1), "alice@example.com", now))
            .await
            .unwrap();
        repo.cancel(id, now).await.unwrap();

        assert!(
            repo.update_status(id, &OrderStatus::Shipped, "out for delivery", now)
                .await
                .unwrap()
        );
        let order = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.admin_comments, "out for delivery");

        assert!(
            !repo
                .update_status(OrderId::new(999), &OrderStatus::Shipped, "", now)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_pagination() {
        let (pool, _dir) = migrated_pool().await;
        let repo = OrderRepository::new(&pool);
        let now = Utc::now();
        for i in 0..5 {
            repo.create(&new_order(
                ItemId::new(1),
                "alice@example.com",
                now + Duration::seconds(i),
            ))
            .await
            .unwrap();
        }

        assert_eq!(repo.count_all().await.unwrap(), 5);
        let first = repo.list_page(2, 0).await.unwrap();
        let last = repo.list_page(2, 4).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(last.len(), 1);
        assert!(first.first().unwrap().created_at > last.first().unwrap().created_at);
    }
}

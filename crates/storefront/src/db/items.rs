//! Item repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crochet_core::{ItemId, ItemStatus, Price};

use super::RepositoryError;
use crate::models::{Item, ItemInput};

const ITEM_COLUMNS: &str =
    "id, title, description, price, delivery_time, image_url, status, created_at";

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    title: String,
    description: String,
    price: String,
    delivery_time: String,
    image_url: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = RepositoryError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let price = Price::parse(&row.price).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for item {}: {e}", row.id))
        })?;
        let status = row
            .status
            .parse::<ItemStatus>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: ItemId::new(row.id),
            title: row.title,
            description: row.description,
            price,
            delivery_time: row.delivery_time,
            image_url: row.image_url,
            status,
            created_at: row.created_at,
        })
    }
}

fn collect(rows: Vec<ItemRow>) -> Result<Vec<Item>, RepositoryError> {
    rows.into_iter().map(Item::try_from).collect()
}

/// Repository for item database operations.
pub struct ItemRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ItemRepository<'a> {
    /// Create a new item repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Items shown in the public catalog (everything except archived), newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_public(&self) -> Result<Vec<Item>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE status != 'archived' ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        collect(rows)
    }

    /// Every item, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Item>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        collect(rows)
    }

    /// Get an item by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"
        ))
        .bind(id.as_i64())
        .fetch_optional(self.pool)
        .await?;
        row.map(Item::try_from).transpose()
    }

    /// Insert a new item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        input: &ItemInput,
        now: DateTime<Utc>,
    ) -> Result<ItemId, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO items (title, description, price, delivery_time, image_url, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.price.amount().to_string())
        .bind(&input.delivery_time)
        .bind(input.image_url.as_deref().unwrap_or_default())
        .bind(input.status.as_str())
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(ItemId::new(result.last_insert_rowid()))
    }

    /// Overwrite an item. The image URL is only replaced when `input.image_url`
    /// is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no item has this ID.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update(&self, id: ItemId, input: &ItemInput) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE items
             SET title = ?, description = ?, price = ?, delivery_time = ?, status = ?,
                 image_url = COALESCE(?, image_url)
             WHERE id = ?",
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.price.amount().to_string())
        .bind(&input.delivery_time)
        .bind(input.status.as_str())
        .bind(input.image_url.as_deref())
        .bind(id.as_i64())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete an item. Orders that reference it are left untouched.
    ///
    /// Returns `false` if no item had this ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&self, id: ItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id.as_i64())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::db::test_support::migrated_pool;

    pub fn sample_input(title: &str, status: ItemStatus) -> ItemInput {
        ItemInput {
            title: title.to_owned(),
            description: "Soft and squishy".to_owned(),
            price: Price::parse("24.50").unwrap(),
            delivery_time: "2-3 weeks".to_owned(),
            status,
            image_url: Some("/static/uploads/a.jpg".to_owned()),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (pool, _dir) = migrated_pool().await;
        let repo = ItemRepository::new(&pool);

        let id = repo
            .create(&sample_input("Bunny", ItemStatus::Available), Utc::now())
            .await
            .unwrap();
        let item = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(item.title, "Bunny");
        assert_eq!(item.price.to_string(), "24.50");
        assert_eq!(item.status, ItemStatus::Available);
        assert_eq!(item.image_url, "/static/uploads/a.jpg");
    }

    #[tokio::test]
    async fn test_public_listing_excludes_archived() {
        let (pool, _dir) = migrated_pool().await;
        let repo = ItemRepository::new(&pool);
        let now = Utc::now();

        repo.create(&sample_input("Bunny", ItemStatus::Available), now)
            .await
            .unwrap();
        repo.create(&sample_input("Bear", ItemStatus::OutOfStock), now)
            .await
            .unwrap();
        repo.create(&sample_input("Old Hat", ItemStatus::Archived), now)
            .await
            .unwrap();

        let public: Vec<_> = repo
            .list_public()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(public.len(), 2);
        assert!(!public.contains(&"Old Hat".to_owned()));
        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_keeps_image_when_none() {
        let (pool, _dir) = migrated_pool().await;
        let repo = ItemRepository::new(&pool);
        let id = repo
            .create(&sample_input("Bunny", ItemStatus::Available), Utc::now())
            .await
            .unwrap();

        let mut input = sample_input("Big Bunny", ItemStatus::OutOfStock);
        input.image_url = None;
        repo.update(id, &input).await.unwrap();

        let item = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(item.title, "Big Bunny");
        assert_eq!(item.status, ItemStatus::OutOfStock);
        assert_eq!(item.image_url, "/static/uploads/a.jpg");
    }

    #[tokio::test]
    async fn test_update_missing_item() {
        let (pool, _dir) = migrated_pool().await;
        let repo = ItemRepository::new(&pool);
        let result = repo
            .update(
                ItemId::new(999),
                &sample_input("Ghost", ItemStatus::Available),
            )
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete() {
        let (pool, _dir) = migrated_pool().await;
        let repo = ItemRepository::new(&pool);
        let id = repo
            .create(&sample_input("Bunny", ItemStatus::Available), Utc::now())
            .await
            .unwrap();

        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.delete(id).await.unwrap());
        assert!(repo.get_by_id(id).await.unwrap().is_none());
    }
}

//! Embedded schema migrations.
//!
//! Each migration is a `.sql` file compiled into the binary. They are applied
//! in version order, each inside its own transaction, and recorded in
//! `schema_migrations` so a second run is a no-op. The session table is
//! created afterwards by the session store itself.

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tower_sessions_sqlx_store::SqliteStore;

/// A single embedded migration.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version key, the file name without extension.
    pub version: &'static str,
    /// SQL script.
    pub sql: &'static str,
}

/// All migrations, sorted by version.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_initial_schema",
        sql: include_str!("../../migrations/0001_initial_schema.sql"),
    },
];

/// Errors from applying migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Could not read or create the bookkeeping table.
    #[error("migration bookkeeping failed: {0}")]
    Bookkeeping(#[source] sqlx::Error),

    /// A migration script failed. Its transaction was rolled back.
    #[error("migration {version} failed: {source}")]
    Failed {
        version: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// The session table could not be created.
    #[error("session table migration failed: {0}")]
    Sessions(#[source] sqlx::Error),
}

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Returns the versions applied by this call, in order.
///
/// # Errors
///
/// Returns `MigrationError::Failed` for the first script that fails. Earlier
/// migrations from the same call stay applied. Returns
/// `MigrationError::Sessions` if the session table cannot be created.
pub async fn run_migrations(pool: &SqlitePool) -> Result<Vec<&'static str>, MigrationError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(MigrationError::Bookkeeping)?;

    let applied: Vec<String> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await
        .map_err(MigrationError::Bookkeeping)?;

    let mut newly_applied = Vec::new();
    for migration in MIGRATIONS {
        if applied.iter().any(|v| v == migration.version) {
            continue;
        }

        apply(pool, migration)
            .await
            .map_err(|source| MigrationError::Failed {
                version: migration.version,
                source,
            })?;

        tracing::info!(version = migration.version, "Applied migration");
        newly_applied.push(migration.version);
    }

    SqliteStore::new(pool.clone())
        .migrate()
        .await
        .map_err(MigrationError::Sessions)?;

    Ok(newly_applied)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;

    sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
        .bind(migration.version)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::create_pool;

    #[test]
    fn test_migrations_are_sorted() {
        let versions: Vec<_> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        assert_eq!(versions, sorted);
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migrate.db");
        let pool = create_pool(path.to_str().unwrap()).await.unwrap();

        let first = run_migrations(&pool).await.unwrap();
        assert_eq!(first.len(), MIGRATIONS.len());

        let second = run_migrations(&pool).await.unwrap();
        assert!(second.is_empty());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, i64::try_from(MIGRATIONS.len()).unwrap());
    }

    #[tokio::test]
    async fn test_schema_has_expected_tables() {
        let (pool, _dir) = crate::db::test_support::migrated_pool().await;

        for table in ["items", "orders", "users", "login_tokens", "tower_sessions"] {
            let found: Option<String> =
                sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                    .bind(table)
                    .fetch_optional(&pool)
                    .await
                    .unwrap();
            assert_eq!(found.as_deref(), Some(table));
        }
    }

    #[tokio::test]
    async fn test_session_store_table_is_ready() {
        use std::collections::HashMap;

        use tower_sessions::cookie::time::{Duration, OffsetDateTime};
        use tower_sessions::session::{Id, Record};
        use tower_sessions::session_store::{ExpiredDeletion, SessionStore};

        let (pool, _dir) = crate::db::test_support::migrated_pool().await;
        let store = SqliteStore::new(pool.clone());

        let mut live = Record {
            id: Id::default(),
            data: HashMap::default(),
            expiry_date: OffsetDateTime::now_utc() + Duration::hours(1),
        };
        let mut stale = Record {
            id: Id::default(),
            data: HashMap::default(),
            expiry_date: OffsetDateTime::now_utc() - Duration::seconds(10),
        };
        store.create(&mut live).await.unwrap();
        store.create(&mut stale).await.unwrap();
        assert!(store.load(&live.id).await.unwrap().is_some());

        store.delete_expired().await.unwrap();
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tower_sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
    }
}

//! Database migration command.
//!
//! Migrations are embedded in the storefront crate and recorded in
//! `schema_migrations`, so running this twice is harmless.

use crochet_storefront::db;

use super::CommandError;

/// Apply every pending migration to the database at `db_path`.
///
/// # Errors
///
/// Returns `CommandError::Database` if the file cannot be opened and
/// `CommandError::Migration` if a script fails.
pub async fn run(db_path: &str) -> Result<Vec<&'static str>, CommandError> {
    tracing::info!(path = %db_path, "Opening database");
    let pool = db::create_pool(db_path).await?;

    let applied = db::run_migrations(&pool).await?;
    if applied.is_empty() {
        tracing::info!("Database is up to date");
    } else {
        for version in &applied {
            tracing::info!(%version, "Applied migration");
        }
        tracing::info!(count = applied.len(), "Migrations complete!");
    }

    pool.close().await;
    Ok(applied)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_run_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli.db");
        let path = path.to_str().unwrap();

        let first = run(path).await.unwrap();
        assert!(!first.is_empty());

        let second = run(path).await.unwrap();
        assert!(second.is_empty());
    }
}

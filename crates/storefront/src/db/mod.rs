//! Database operations for the storefront `SQLite` file.
//!
//! ## Tables
//!
//! - `items` - Catalog entries
//! - `orders` - Customer orders with their magic link token
//! - `users` - Admin accounts
//! - `login_tokens` - Short-lived "my orders" links
//! - `tower_sessions` - Session records, owned by `tower-sessions-sqlx-store`
//! - `schema_migrations` - Applied migration versions
//!
//! # Migrations
//!
//! Migrations live in `crates/storefront/migrations/`, are embedded in the
//! binary, and are applied at server startup or via:
//! ```bash
//! cargo run -p crochet-cli -- migrate
//! ```

pub mod items;
pub mod login_tokens;
pub mod migrate;
pub mod orders;
pub mod stats;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use thiserror::Error;

pub use items::ItemRepository;
pub use login_tokens::LoginTokenRepository;
pub use migrate::{MigrationError, run_migrations};
pub use orders::OrderRepository;
pub use stats::StatsRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate username).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Open (creating if missing) the `SQLite` database at `path`.
///
/// The connection runs in WAL mode with foreign keys on and waits up to five
/// seconds on a locked database instead of failing immediately.
///
/// # Errors
///
/// Returns `sqlx::Error` if the path is invalid or the file cannot be opened.
pub async fn create_pool(path: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

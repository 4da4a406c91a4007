//! CLI subcommands.

pub mod migrate;
pub mod users;

use thiserror::Error;

use crochet_storefront::db::MigrationError;
use crochet_storefront::services::AuthError;

/// Errors from any subcommand.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The database file could not be opened.
    #[error("database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// The admin account could not be created.
    #[error("could not create admin: {0}")]
    Auth(#[from] AuthError),
}

//! Crochet CLI - database migrations and admin accounts.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending database migrations
//! crochet-cli migrate
//!
//! # Create an admin account
//! crochet-cli add-user --username admin --password 'correct horse'
//! ```
//!
//! The database file comes from `--db`, then `DB_PATH`, then `./crochet.db`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "crochet-cli")]
#[command(version, about = "Crochet storefront CLI tools")]
struct Cli {
    /// `SQLite` database file
    #[arg(long, global = true, env = "DB_PATH", default_value = "./crochet.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create an admin account
    AddUser {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => {
            commands::migrate::run(&cli.db).await?;
        }
        Commands::AddUser { username, password } => {
            commands::users::add_user(&cli.db, &username, &SecretString::from(password)).await?;
        }
    }
    Ok(())
}

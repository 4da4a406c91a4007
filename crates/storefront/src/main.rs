//! Crochet storefront server.
//!
//! Serves the public catalog, customer order pages, and the admin panel from
//! one binary backed by a local `SQLite` file.
//!
//! Pending migrations are applied at startup. Admin accounts are created with
//! `crochet-cli add-user`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::time::Duration;

use sentry::integrations::tracing as sentry_tracing;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crochet_storefront::config::StorefrontConfig;
use crochet_storefront::middleware::spawn_sweeper;
use crochet_storefront::state::AppState;
use crochet_storefront::{app, db};

/// In-flight requests get this long to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "crochet_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    config.warn_generated_keys();

    let pool = db::create_pool(&config.database_path)
        .await
        .expect("Failed to open database");
    tracing::info!(path = %config.database_path, "Database opened");

    let applied = db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    if !applied.is_empty() {
        tracing::info!(?applied, "Applied migrations");
    }

    let addr = config.socket_addr();
    let state = AppState::new(config, pool).expect("Failed to initialize application state");

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        state.rate_limiter().clone(),
        state.session_store(),
        shutdown.clone(),
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!("storefront listening on {}", addr);

    let server = axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let mut server = tokio::spawn(async move { server.await });

    let signalled = tokio::select! {
        result = &mut server => {
            if let Ok(Err(e)) = result {
                tracing::error!(error = %e, "Server error");
            }
            false
        }
        () = shutdown_signal() => true,
    };

    if signalled {
        shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
            tracing::warn!("Graceful shutdown timed out, dropping open connections");
        }
    }

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Sweeper task failed");
    }
    tracing::info!("Shutdown complete");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

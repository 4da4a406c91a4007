//! In-process test harness for the storefront.
//!
//! Each [`TestServer`] gets its own temporary database and upload directory
//! and listens on an ephemeral localhost port.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Utc;
use reqwest::{Client, Response, redirect::Policy};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crochet_core::{ItemId, ItemStatus, Price};
use crochet_storefront::config::StorefrontConfig;
use crochet_storefront::db::{self, ItemRepository};
use crochet_storefront::models::ItemInput;
use crochet_storefront::services::AuthService;
use crochet_storefront::state::AppState;

/// A running storefront.
pub struct TestServer {
    base_url: String,
    state: AppState,
    server: JoinHandle<()>,
    dir: TempDir,
}

impl TestServer {
    /// Start with rate limiting disabled.
    pub async fn start() -> Self {
        Self::start_with(&[("RATE_LIMIT_WINDOW_SECS", "0")]).await
    }

    /// Start with extra environment settings layered over the test defaults.
    pub async fn start_with(overrides: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let mut env: HashMap<String, String> = HashMap::from([
            (
                "DB_PATH".to_owned(),
                dir.path().join("test.db").display().to_string(),
            ),
            (
                "STATIC_DIR".to_owned(),
                dir.path().join("static").display().to_string(),
            ),
            ("HOST".to_owned(), "127.0.0.1".to_owned()),
            ("COOKIE_SECURE".to_owned(), "false".to_owned()),
        ]);
        for (key, value) in overrides {
            env.insert((*key).to_owned(), (*value).to_owned());
        }

        let config = StorefrontConfig::from_lookup(|key| env.get(key).cloned())
            .expect("Invalid test configuration");
        let pool = db::create_pool(&config.database_path)
            .await
            .expect("Failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("Failed to migrate test database");
        let state = AppState::new(config, pool).expect("Failed to build state");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");

        let app = crochet_storefront::app(state.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            server,
            dir,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        self.state.pool()
    }

    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Directory product photos are written to.
    #[must_use]
    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("static").join("uploads")
    }

    /// Create an admin account directly in the database.
    pub async fn create_admin(&self, username: &str, password: &str) {
        AuthService::new(self.pool())
            .create_admin(username, password)
            .await
            .expect("Failed to create admin");
    }

    /// Insert a catalog item priced at 19.99.
    pub async fn create_item(&self, title: &str, status: ItemStatus) -> ItemId {
        let input = ItemInput {
            title: title.to_owned(),
            description: format!("{title} description"),
            price: Price::parse("19.99").expect("valid price"),
            delivery_time: "2 weeks".to_owned(),
            status,
            image_url: Some(format!("/static/uploads/{}.jpg", title.to_lowercase())),
        };
        ItemRepository::new(self.pool())
            .create(&input, Utc::now())
            .await
            .expect("Failed to create item")
    }

    /// The login token currently stored for `email`, if any.
    pub async fn login_token_for(&self, email: &str) -> Option<String> {
        sqlx::query_scalar("SELECT token FROM login_tokens WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .expect("Failed to read login tokens")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A browser-like client: keeps cookies, does not follow redirects.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("Response has no Location header")
        .to_owned()
}

/// Scrape the hidden `csrf_token` field from a rendered form.
#[must_use]
pub fn csrf_token(html: &str) -> String {
    html.split_once(r#"name="csrf_token" value=""#)
        .and_then(|(_, rest)| rest.split_once('"'))
        .map(|(token, _)| token.to_owned())
        .expect("Page has no CSRF field")
}

/// GET `path` and return the body, asserting a 200.
pub async fn get_page(client: &Client, server: &TestServer, path: &str) -> String {
    let response = client
        .get(server.url(path))
        .send()
        .await
        .expect("GET failed");
    assert_eq!(response.status(), 200, "GET {path}");
    response.text().await.expect("Unreadable body")
}

/// The CSRF token of the form at `path`.
pub async fn form_token(client: &Client, server: &TestServer, path: &str) -> String {
    csrf_token(&get_page(client, server, path).await)
}

/// Follow a redirect and return the rendered page.
pub async fn follow(client: &Client, server: &TestServer, response: &Response) -> String {
    assert_eq!(response.status(), 303, "expected a See Other redirect");
    get_page(client, server, &location(response)).await
}

/// Log `client` in as an admin.
pub async fn login(client: &Client, server: &TestServer, username: &str, password: &str) {
    let token = form_token(client, server, "/login").await;
    let response = client
        .post(server.url("/login"))
        .form(&[
            ("csrf_token", token.as_str()),
            ("username", username),
            ("password", password),
        ])
        .send()
        .await
        .expect("Login request failed");
    assert_eq!(location(&response), "/admin");
}

/// A small PNG for upload tests.
#[must_use]
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([210, 140, 190]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    buffer
}

//! Passwordless access to every order placed with an email address.
//!
//! A customer asks for a link by email. If the address has at least one
//! order, a login token valid for one hour is issued and mailed. The caller
//! sees the same outcome either way, so the form cannot be used to probe
//! which addresses have ordered.
//!
//! A login token may be used any number of times until it expires. Each
//! address holds at most one token: requesting a new link replaces the old one.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crochet_core::{Email, EmailError, MagicToken, TokenError, generate_token};

use super::orders::ORDER_TOKEN_TTL_DAYS;
use crate::db::{LoginTokenRepository, OrderRepository, RepositoryError};
use crate::models::Order;
use crate::services::EmailService;

/// How long a login token stays valid, in minutes.
pub const LOGIN_TOKEN_TTL_MINUTES: i64 = 60;

/// The single message shown after any well-formed status-link request.
pub const STATUS_LINK_SENT: &str = "If you have active orders, a link has been sent to your email.";

/// Attempts at refreshing an expired order token before giving up.
const MAX_REFRESH_ATTEMPTS: usize = 3;

/// Errors from the magic link flow.
#[derive(Debug, Error)]
pub enum MagicLinkError {
    /// The submitted email is empty or malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// No token was supplied.
    #[error("missing access token")]
    MissingToken,

    /// The token is malformed, unknown, or expired.
    #[error("invalid or expired login token")]
    InvalidToken,

    /// Secure random generation failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Orders visible through a login token.
#[derive(Debug)]
pub struct MyOrders {
    pub email: Email,
    pub orders: Vec<Order>,
}

/// Status-link issuing and validation.
pub struct MagicLinkService<'a> {
    pool: &'a SqlitePool,
    email: &'a EmailService,
}

impl<'a> MagicLinkService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, email: &'a EmailService) -> Self {
        Self { pool, email }
    }

    /// Handle a status-link request for `email`.
    ///
    /// Returns the outcome message, identical whether or not the address has
    /// orders.
    ///
    /// # Errors
    ///
    /// Returns `MagicLinkError::InvalidEmail` if the address is malformed.
    /// Storage and RNG failures are returned as-is.
    pub async fn request_status_link(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<&'static str, MagicLinkError> {
        let email = Email::parse(email)?;

        let count = OrderRepository::new(self.pool)
            .count_by_email(&email)
            .await?;

        if count > 0 {
            let token = generate_token()?;
            LoginTokenRepository::new(self.pool)
                .issue(
                    &token,
                    &email,
                    now + Duration::minutes(LOGIN_TOKEN_TTL_MINUTES),
                    now,
                )
                .await?;
            self.email.send_status_link(&email, &token);
        } else {
            tracing::info!(domain = email.domain(), "Status link requested for unknown email");
        }

        Ok(STATUS_LINK_SENT)
    }

    /// Validate a login token and list the orders of its email.
    ///
    /// The token is accepted strictly before `expires_at` and is not consumed.
    /// Any listed order whose own magic link has expired is given a fresh
    /// token so every link on the page works.
    ///
    /// # Errors
    ///
    /// Returns `MagicLinkError::MissingToken` for blank input and
    /// `MagicLinkError::InvalidToken` for malformed, unknown, or expired tokens.
    pub async fn orders_for_login_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<MyOrders, MagicLinkError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(MagicLinkError::MissingToken);
        }
        let token = MagicToken::parse(token).map_err(|_| MagicLinkError::InvalidToken)?;

        let login = LoginTokenRepository::new(self.pool)
            .get(&token)
            .await?
            .filter(|t| t.is_valid_at(now))
            .ok_or(MagicLinkError::InvalidToken)?;

        let orders_repo = OrderRepository::new(self.pool);
        let mut orders = orders_repo.list_by_email(&login.email).await?;
        for order in &mut orders {
            if order.is_link_expired_at(now) {
                self.refresh_order_token(&orders_repo, order, now).await?;
            }
        }

        Ok(MyOrders {
            email: login.email,
            orders,
        })
    }

    async fn refresh_order_token(
        &self,
        repo: &OrderRepository<'_>,
        order: &mut Order,
        now: DateTime<Utc>,
    ) -> Result<(), MagicLinkError> {
        let expiry = now + Duration::days(ORDER_TOKEN_TTL_DAYS);
        let mut attempt = 1;
        loop {
            let token = generate_token()?;
            match repo.refresh_token(order.id, &token, expiry).await {
                Ok(()) => {
                    tracing::info!(order_id = %order.id, "Refreshed expired order link");
                    order.magic_token = token;
                    order.magic_token_expiry = expiry;
                    return Ok(());
                }
                Err(RepositoryError::Conflict(_)) if attempt < MAX_REFRESH_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crochet_core::ItemStatus;

    use super::*;
    use crate::db::ItemRepository;
    use crate::db::items::tests::sample_input;
    use crate::db::test_support::migrated_pool;
    use crate::services::orders::{CustomerForm, OrderService};

    async fn place(pool: &SqlitePool, email: &EmailService, address: &str) -> Order {
        let item_id = ItemRepository::new(pool)
            .create(&sample_input("Bunny", ItemStatus::Available), Utc::now())
            .await
            .unwrap();
        let form = CustomerForm {
            name: "Alice".to_owned(),
            email: address.to_owned(),
            address: "123 Main St".to_owned(),
            quantity: "1".to_owned(),
            notes: String::new(),
        };
        OrderService::new(pool, email)
            .place_order(item_id, &form, Utc::now())
            .await
            .unwrap()
    }

    async fn latest_login_token(pool: &SqlitePool, email: &str) -> Option<String> {
        sqlx::query_scalar("SELECT token FROM login_tokens WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_same_message_for_known_and_unknown_email() {
        let (pool, _dir) = migrated_pool().await;
        let email = EmailService::new("http://localhost:8585");
        place(&pool, &email, "alice@example.com").await;
        let svc = MagicLinkService::new(&pool, &email);
        let now = Utc::now();

        let known = svc
            .request_status_link("alice@example.com", now)
            .await
            .unwrap();
        let unknown = svc
            .request_status_link("nobody@example.com", now)
            .await
            .unwrap();

        assert_eq!(known, unknown);
        assert!(latest_login_token(&pool, "alice@example.com").await.is_some());
        assert!(latest_login_token(&pool, "nobody@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_request_matches_email_case_insensitively() {
        let (pool, _dir) = migrated_pool().await;
        let email = EmailService::new("http://localhost:8585");
        place(&pool, &email, "alice@example.com").await;

        MagicLinkService::new(&pool, &email)
            .request_status_link("  ALICE@Example.com ", Utc::now())
            .await
            .unwrap();
        assert!(latest_login_token(&pool, "alice@example.com").await.is_some());
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected() {
        let (pool, _dir) = migrated_pool().await;
        let email = EmailService::new("http://localhost:8585");
        let result = MagicLinkService::new(&pool, &email)
            .request_status_link("not an email", Utc::now())
            .await;
        assert!(matches!(result, Err(MagicLinkError::InvalidEmail(_))));
    }

    #[tokio::test]
    async fn test_login_token_window() {
        let (pool, _dir) = migrated_pool().await;
        let email = EmailService::new("http://localhost:8585");
        place(&pool, &email, "alice@example.com").await;
        place(&pool, &email, "alice@example.com").await;
        place(&pool, &email, "bob@example.com").await;
        let svc = MagicLinkService::new(&pool, &email);
        let now = Utc::now();

        svc.request_status_link("alice@example.com", now)
            .await
            .unwrap();
        let token = latest_login_token(&pool, "alice@example.com")
            .await
            .unwrap();
        let expires_at = now + Duration::minutes(LOGIN_TOKEN_TTL_MINUTES);

        let mine = svc.orders_for_login_token(&token, now).await.unwrap();
        assert_eq!(mine.email.as_str(), "alice@example.com");
        assert_eq!(mine.orders.len(), 2);

        // Reusable within the window.
        let just_before = expires_at - Duration::seconds(1);
        assert!(svc.orders_for_login_token(&token, just_before).await.is_ok());

        assert!(matches!(
            svc.orders_for_login_token(&token, expires_at).await,
            Err(MagicLinkError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_missing_and_unknown_tokens() {
        let (pool, _dir) = migrated_pool().await;
        let email = EmailService::new("http://localhost:8585");
        let svc = MagicLinkService::new(&pool, &email);
        let now = Utc::now();

        assert!(matches!(
            svc.orders_for_login_token("  ", now).await,
            Err(MagicLinkError::MissingToken)
        ));
        assert!(matches!(
            svc.orders_for_login_token("short", now).await,
            Err(MagicLinkError::InvalidToken)
        ));
        assert!(matches!(
            svc.orders_for_login_token(&"a".repeat(32), now).await,
            Err(MagicLinkError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_new_link_replaces_old_one() {
        let (pool, _dir) = migrated_pool().await;
        let email = EmailService::new("http://localhost:8585");
        place(&pool, &email, "alice@example.com").await;
        let svc = MagicLinkService::new(&pool, &email);
        let now = Utc::now();

        svc.request_status_link("alice@example.com", now)
            .await
            .unwrap();
        let first = latest_login_token(&pool, "alice@example.com")
            .await
            .unwrap();
        svc.request_status_link("alice@example.com", now)
            .await
            .unwrap();
        let second = latest_login_token(&pool, "alice@example.com")
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(svc.orders_for_login_token(&first, now).await.is_err());
        assert!(svc.orders_for_login_token(&second, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_order_links_are_refreshed() {
        let (pool, _dir) = migrated_pool().await;
        let email = EmailService::new("http://localhost:8585");
        let order = place(&pool, &email, "alice@example.com").await;
        let svc = MagicLinkService::new(&pool, &email);

        let later = order.magic_token_expiry + Duration::days(1);
        svc.request_status_link("alice@example.com", later)
            .await
            .unwrap();
        let token = latest_login_token(&pool, "alice@example.com")
            .await
            .unwrap();

        let mine = svc.orders_for_login_token(&token, later).await.unwrap();
        let refreshed = mine.orders.first().unwrap();
        assert_ne!(refreshed.magic_token, order.magic_token);
        assert_eq!(
            refreshed.magic_token_expiry,
            later + Duration::days(ORDER_TOKEN_TTL_DAYS)
        );

        let orders = OrderService::new(&pool, &email);
        assert!(
            orders
                .order_by_token(refreshed.magic_token.as_str(), later)
                .await
                .is_ok()
        );
        assert!(matches!(
            orders
                .order_by_token(order.magic_token.as_str(), later)
                .await,
            Err(crate::services::OrderError::NotFound)
        ));
    }
}

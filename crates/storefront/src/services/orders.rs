//! Order lifecycle.
//!
//! ```text
//! Ordered ──customer cancel──► Cancelled
//!    │
//!    └──admin sets any status (from any state)──► Shipped, Completed, ...
//! ```
//!
//! Customers reach an order only through its magic token and may edit or
//! cancel it while it is `Ordered`. Those writes are conditional in SQL, so a
//! concurrent cancel and edit cannot both win. Admin updates are
//! unconditional and last-write-wins.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crochet_core::{
    Email, EmailError, ItemId, MagicToken, OrderId, OrderStatus, TokenError, generate_order_ref,
    generate_token,
};

use crate::db::{ItemRepository, OrderRepository, RepositoryError};
use crate::models::{CustomerDetails, NewOrder, Order};
use crate::services::EmailService;

/// How long an order's magic link stays valid, in days.
pub const ORDER_TOKEN_TTL_DAYS: i64 = 30;

/// Attempts at inserting an order before giving up on ref/token collisions.
const MAX_CREATE_ATTEMPTS: usize = 3;

/// Errors from the order lifecycle.
#[derive(Debug, Error)]
pub enum OrderError {
    /// One or more form fields are invalid. Each entry is user-facing.
    #[error("invalid order form: {}", .0.join(" "))]
    Validation(Vec<String>),

    /// The item does not exist or is not available for ordering.
    #[error("item is not available")]
    ItemUnavailable,

    /// Unknown or malformed token, or unknown order ID.
    #[error("order not found")]
    NotFound,

    /// The magic link is past its expiry.
    #[error("order link expired")]
    Expired,

    /// The order has left `Ordered` and is locked for the customer.
    #[error("order can no longer be changed")]
    NotEditable,

    /// Secure random generation failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Raw customer fields as submitted by the checkout or edit form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CustomerForm {
    pub name: String,
    pub email: String,
    pub address: String,
    pub quantity: String,
    pub notes: String,
}

impl CustomerForm {
    /// Validate into [`CustomerDetails`].
    ///
    /// A missing, non-numeric, or zero quantity falls back to
    /// `default_quantity`. All problems are reported together.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` listing every invalid field.
    pub fn validate(&self, default_quantity: u32) -> Result<CustomerDetails, OrderError> {
        let mut errors = Vec::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.push("Your name is required.".to_owned());
        }

        let email = match Email::parse(&self.email) {
            Ok(email) => Some(email),
            Err(EmailError::Empty) => {
                errors.push("Email address is required.".to_owned());
                None
            }
            Err(_) => {
                errors.push("Please enter a valid email address.".to_owned());
                None
            }
        };

        let address = self.address.trim();
        if address.is_empty() {
            errors.push("Shipping address is required.".to_owned());
        }

        let quantity = self
            .quantity
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|q| *q >= 1)
            .unwrap_or(default_quantity);

        match email {
            Some(email) if errors.is_empty() => Ok(CustomerDetails {
                name: name.to_owned(),
                email,
                address: address.to_owned(),
                quantity,
                notes: self.notes.trim().to_owned(),
            }),
            _ => Err(OrderError::Validation(errors)),
        }
    }
}

/// Order lifecycle operations.
pub struct OrderService<'a> {
    pool: &'a SqlitePool,
    email: &'a EmailService,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, email: &'a EmailService) -> Self {
        Self { pool, email }
    }

    /// Place an order for an available item.
    ///
    /// The new order starts as `Ordered` with a fresh magic token valid for
    /// 30 days. A confirmation email is logged.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for bad form input,
    /// `OrderError::ItemUnavailable` if the item cannot be ordered, or
    /// `OrderError::Repository` if the order could not be stored.
    pub async fn place_order(
        &self,
        item_id: ItemId,
        form: &CustomerForm,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let details = form.validate(1)?;

        let item = ItemRepository::new(self.pool)
            .get_by_id(item_id)
            .await?
            .ok_or(OrderError::ItemUnavailable)?;
        if !item.is_orderable() {
            return Err(OrderError::ItemUnavailable);
        }

        let orders = OrderRepository::new(self.pool);
        let mut attempt = 1;
        let id = loop {
            let new_order = NewOrder {
                order_ref: generate_order_ref()?,
                item_id,
                details: details.clone(),
                magic_token: generate_token()?,
                magic_token_expiry: now + Duration::days(ORDER_TOKEN_TTL_DAYS),
                created_at: now,
            };

            match orders.create(&new_order).await {
                Ok(id) => break id,
                Err(RepositoryError::Conflict(reason)) if attempt < MAX_CREATE_ATTEMPTS => {
                    tracing::warn!(attempt, %reason, "Order ref or token collision, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        let order = orders.get_by_id(id).await?.ok_or(OrderError::NotFound)?;
        tracing::info!(order_id = %order.id, order_ref = %order.order_ref, "Order placed");
        self.email.send_order_confirmation(&order);
        Ok(order)
    }

    /// Resolve a magic token to its order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for malformed or unknown tokens and
    /// `OrderError::Expired` once `now` reaches the token's expiry.
    pub async fn order_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let token = MagicToken::parse(token).map_err(|_| OrderError::NotFound)?;
        let order = OrderRepository::new(self.pool)
            .get_by_token(&token)
            .await?
            .ok_or(OrderError::NotFound)?;

        if order.is_link_expired_at(now) {
            return Err(OrderError::Expired);
        }
        Ok(order)
    }

    /// Resolve a token to an order the customer may still change.
    ///
    /// # Errors
    ///
    /// As [`Self::order_by_token`], plus `OrderError::NotEditable` if the
    /// order has left `Ordered`.
    pub async fn editable_order(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let order = self.order_by_token(token, now).await?;
        if !order.is_editable() {
            return Err(OrderError::NotEditable);
        }
        Ok(order)
    }

    /// Overwrite the customer fields of an `Ordered` order.
    ///
    /// Status and link expiry are unchanged. An invalid quantity keeps the
    /// current quantity.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound`, `OrderError::Expired`,
    /// `OrderError::NotEditable`, or `OrderError::Validation`.
    pub async fn update_order(
        &self,
        token: &str,
        form: &CustomerForm,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let order = self.editable_order(token, now).await?;
        let details = form.validate(order.quantity)?;

        let orders = OrderRepository::new(self.pool);
        if !orders.update_customer_details(order.id, &details, now).await? {
            return Err(OrderError::NotEditable);
        }

        tracing::info!(order_id = %order.id, "Order updated by customer");
        orders.get_by_id(order.id).await?.ok_or(OrderError::NotFound)
    }

    /// Cancel an `Ordered` order.
    ///
    /// Cancelling an already-cancelled (or shipped, ...) order is rejected
    /// with `NotEditable` rather than treated as success.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound`, `OrderError::Expired`, or
    /// `OrderError::NotEditable`.
    pub async fn cancel_order(&self, token: &str, now: DateTime<Utc>) -> Result<(), OrderError> {
        let order = self.order_by_token(token, now).await?;

        if !OrderRepository::new(self.pool).cancel(order.id, now).await? {
            return Err(OrderError::NotEditable);
        }

        tracing::info!(order_id = %order.id, order_ref = %order.order_ref, "Order cancelled");
        Ok(())
    }

    /// Admin override of status and internal comments, from any state.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for a blank status and
    /// `OrderError::NotFound` for an unknown order.
    pub async fn admin_update_status(
        &self,
        id: OrderId,
        status: &str,
        admin_comments: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| OrderError::Validation(vec!["Status is required.".to_owned()]))?;

        let updated = OrderRepository::new(self.pool)
            .update_status(id, &status, admin_comments.trim(), now)
            .await?;
        if !updated {
            return Err(OrderError::NotFound);
        }

        tracing::info!(order_id = %id, %status, "Order status updated by admin");
        Ok(())
    }
}

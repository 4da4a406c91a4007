//! Mock email delivery.
//!
//! No mail is sent. Each message is written to the log as a structured
//! event, which is how links reach the customer during development.

use crochet_core::{Email, MagicToken};

use crate::models::Order;

/// Shop name used in subject lines.
const SHOP_NAME: &str = "Crochet by Juliette";

/// Builds customer-facing links and "sends" emails by logging them.
#[derive(Debug, Clone)]
pub struct EmailService {
    base_url: String,
}

impl EmailService {
    /// Create a service that builds links under `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Link to a single order's status page.
    #[must_use]
    pub fn order_status_url(&self, token: &MagicToken) -> String {
        format!("{}/order/status/{token}", self.base_url)
    }

    /// Link to the list of every order for an email.
    #[must_use]
    pub fn my_orders_url(&self, token: &MagicToken) -> String {
        format!("{}/my-orders?token={token}", self.base_url)
    }

    /// Confirmation sent after checkout.
    pub fn send_order_confirmation(&self, order: &Order) {
        tracing::info!(
            to = %order.customer_email,
            subject = %format!("Order Confirmation - {SHOP_NAME}"),
            order_ref = %order.order_ref,
            link = %self.order_status_url(&order.magic_token),
            "Mock email sent"
        );
    }

    /// Link to all orders placed with `email`.
    pub fn send_status_link(&self, email: &Email, token: &MagicToken) {
        tracing::info!(
            to = %email,
            subject = %format!("Your Orders - {SHOP_NAME}"),
            link = %self.my_orders_url(token),
            "Mock email sent"
        );
    }
}

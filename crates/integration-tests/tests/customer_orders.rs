//! Checkout and magic-link order management, end to end.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use crochet_core::{ItemId, ItemStatus};
use crochet_integration_tests::{TestServer, client, follow, form_token, get_page, location};
use crochet_storefront::services::OrderService;
use reqwest::Client;

const STATUS_PREFIX: &str = "/order/status/";

async fn place_order(client: &Client, server: &TestServer, item: ItemId, name: &str) -> String {
    let path = format!("/order?id={item}");
    let token = form_token(client, server, &path).await;
    let item_id = item.to_string();

    let response = client
        .post(server.url("/order"))
        .form(&[
            ("csrf_token", token.as_str()),
            ("item_id", item_id.as_str()),
            ("name", name),
            ("email", "Alice@Example.com"),
            ("address", "123 Main St"),
            ("quantity", "2"),
            ("notes", "Pink please"),
        ])
        .send()
        .await
        .unwrap();

    let to = location(&response);
    assert!(to.starts_with(STATUS_PREFIX), "unexpected redirect {to}");
    to.trim_start_matches(STATUS_PREFIX).to_owned()
}

#[tokio::test]
async fn test_home_hides_archived_items() {
    let server = TestServer::start().await;
    server.create_item("Bunny", ItemStatus::Available).await;
    server.create_item("Scarf", ItemStatus::OutOfStock).await;
    server.create_item("Blanket", ItemStatus::Archived).await;

    let html = get_page(&client(), &server, "/").await;
    assert!(html.contains("Bunny"));
    assert!(html.contains("Scarf"));
    assert!(!html.contains("Blanket"));
}

#[tokio::test]
async fn test_place_view_edit_and_cancel() {
    let server = TestServer::start().await;
    let item = server.create_item("Bunny", ItemStatus::Available).await;
    let client = client();

    let token = place_order(&client, &server, item, "Alice").await;
    assert_eq!(token.len(), 32);

    let status_path = format!("{STATUS_PREFIX}{token}");
    let html = get_page(&client, &server, &status_path).await;
    assert!(html.contains("Order placed successfully! Check your email for details."));
    assert!(html.contains("Bunny"));
    assert!(html.contains("alice@example.com"));
    assert!(html.contains("Ordered"));
    assert!(html.contains("Edit order"));

    let csrf = form_token(&client, &server, &format!("/order/edit/{token}")).await;
    let response = client
        .post(server.url("/order/update"))
        .form(&[
            ("csrf_token", csrf.as_str()),
            ("token", token.as_str()),
            ("name", "Alice Smith"),
            ("email", "alice@example.com"),
            ("address", "9 Elm St"),
            ("quantity", "3"),
            ("notes", ""),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), status_path);
    let html = follow(&client, &server, &response).await;
    assert!(html.contains("Order updated successfully!"));
    assert!(html.contains("Alice Smith"));
    assert!(html.contains("9 Elm St"));

    let csrf = form_token(&client, &server, &status_path).await;
    let response = client
        .post(server.url("/order/cancel"))
        .form(&[("csrf_token", csrf.as_str()), ("token", token.as_str())])
        .send()
        .await
        .unwrap();
    let html = follow(&client, &server, &response).await;
    assert!(html.contains("Order cancelled successfully."));
    assert!(html.contains("Cancelled"));
    assert!(!html.contains("Edit order"));

    // Cancelled orders are locked.
    let response = client
        .get(server.url(&format!("/order/edit/{token}")))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), status_path);
    let html = follow(&client, &server, &response).await;
    assert!(html.contains("This order cannot be edited anymore."));
}

#[tokio::test]
async fn test_invalid_checkout_redirects_back_with_errors() {
    let server = TestServer::start().await;
    let item = server.create_item("Bunny", ItemStatus::Available).await;
    let client = client();

    let form_path = format!("/order?id={item}");
    let csrf = form_token(&client, &server, &form_path).await;
    let item_id = item.to_string();
    let response = client
        .post(server.url("/order"))
        .form(&[
            ("csrf_token", csrf.as_str()),
            ("item_id", item_id.as_str()),
            ("name", ""),
            ("email", "not-an-email"),
            ("address", ""),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(location(&response), form_path);
    let html = follow(&client, &server, &response).await;
    assert!(html.contains("Your name is required."));
    assert!(html.contains("Please enter a valid email address."));
    assert!(html.contains("Shipping address is required."));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(server.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_out_of_stock_item_cannot_be_ordered() {
    let server = TestServer::start().await;
    let item = server.create_item("Scarf", ItemStatus::OutOfStock).await;
    let client = client();

    let csrf = form_token(&client, &server, &format!("/order?id={item}")).await;
    let item_id = item.to_string();
    let response = client
        .post(server.url("/order"))
        .form(&[
            ("csrf_token", csrf.as_str()),
            ("item_id", item_id.as_str()),
            ("name", "Alice"),
            ("email", "alice@example.com"),
            ("address", "123 Main St"),
        ])
        .send()
        .await
        .unwrap();

    assert_eq!(location(&response), "/");
    let html = follow(&client, &server, &response).await;
    assert!(html.contains("This item is not available for ordering."));
}

#[tokio::test]
async fn test_unknown_token_redirects_to_status_request() {
    let server = TestServer::start().await;
    let client = client();

    let response = client
        .get(server.url("/order/status/0123456789abcdef0123456789abcdef"))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), "/status-request");
    let html = follow(&client, &server, &response).await;
    assert!(html.contains("Order not found or link is invalid."));
}

#[tokio::test]
async fn test_admin_comments_never_shown_to_customer() {
    let server = TestServer::start().await;
    let item = server.create_item("Bunny", ItemStatus::Available).await;
    let client = client();
    let token = place_order(&client, &server, item, "Alice").await;

    let order_id = sqlx::query_scalar::<_, i64>("SELECT id FROM orders WHERE magic_token = ?")
        .bind(&token)
        .fetch_one(server.pool())
        .await
        .unwrap();
    OrderService::new(server.pool(), server.state().email())
        .admin_update_status(
            order_id.into(),
            "Shipped",
            "customer was rude on the phone",
            Utc::now(),
        )
        .await
        .unwrap();

    let html = get_page(&client, &server, &format!("{STATUS_PREFIX}{token}")).await;
    assert!(html.contains("Shipped"));
    assert!(!html.contains("customer was rude"));
    assert!(!html.contains("Cancel order"));
}

#[tokio::test]
async fn test_deleted_item_shows_placeholder() {
    let server = TestServer::start().await;
    let item = server.create_item("Bunny", ItemStatus::Available).await;
    let client = client();
    let token = place_order(&client, &server, item, "Alice").await;

    sqlx::query("DELETE FROM items WHERE id = ?")
        .bind(item.as_i64())
        .execute(server.pool())
        .await
        .unwrap();

    let html = get_page(&client, &server, &format!("{STATUS_PREFIX}{token}")).await;
    assert!(html.contains("Item no longer available"));
}

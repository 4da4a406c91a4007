//! Admin order list and status updates.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

use crochet_core::{OrderId, OrderStatus};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CsrfToken, RequireAdmin, take_flashes};
use crate::models::{CurrentAdmin, FlashMessage, Order};
use crate::routes::{errors_redirect, flash_redirect};
use crate::services::{OrderError, OrderService};
use crate::state::AppState;

const ORDERS_PATH: &str = "/admin/orders";

/// Orders per page when `limit` is absent or invalid.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest accepted `limit`.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Raw pagination query. Unparseable values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Resolved page position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    #[must_use]
    pub fn from_query(query: &PageQuery) -> Self {
        let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<i64>().ok());

        let page = parse(&query.page).filter(|p| *p >= 1).unwrap_or(1);
        let limit = parse(&query.limit)
            .filter(|l| *l >= 1)
            .map_or(DEFAULT_PAGE_SIZE, |l| l.min(MAX_PAGE_SIZE));
        Self { page, limit }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Number of pages for `total` orders. Never less than one.
    #[must_use]
    pub const fn total_pages(&self, total: i64) -> i64 {
        let pages = (total + self.limit - 1) / self.limit;
        if pages < 1 { 1 } else { pages }
    }
}

/// Status update form.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusForm {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub admin_comments: String,
}

/// Order list page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders.html")]
pub struct OrdersTemplate {
    pub flashes: Vec<FlashMessage>,
    pub admin: CurrentAdmin,
    pub csrf_token: String,
    pub orders: Vec<Order>,
    pub status_options: Vec<String>,
    pub current_page: i64,
    pub total_pages: i64,
    pub limit: i64,
}

/// List orders, newest first, one page at a time.
pub async fn list(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    CsrfToken(csrf_token): CsrfToken,
    Query(query): Query<PageQuery>,
) -> Result<OrdersTemplate> {
    let pagination = Pagination::from_query(&query);
    let repo = OrderRepository::new(state.pool());

    let orders = repo
        .list_page(pagination.limit, pagination.offset())
        .await?;
    let total = repo.count_all().await?;

    Ok(OrdersTemplate {
        flashes: take_flashes(&session).await?,
        admin,
        csrf_token,
        orders,
        status_options: OrderStatus::STANDARD
            .iter()
            .map(|s| s.as_str().to_owned())
            .collect(),
        current_page: pagination.page,
        total_pages: pagination.total_pages(total),
        limit: pagination.limit,
    })
}

/// Set an order's status and internal comments.
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateStatusForm>,
) -> Result<Response> {
    let id = form
        .id
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("Invalid ID".to_owned()))?;

    let service = OrderService::new(state.pool(), state.email());
    match service
        .admin_update_status(
            OrderId::new(id),
            &form.status,
            &form.admin_comments,
            Utc::now(),
        )
        .await
    {
        Ok(()) => {
            tracing::info!(admin = %admin.username, order_id = id, "Order updated from admin panel");
            flash_redirect(&session, FlashMessage::success("Order updated!"), ORDERS_PATH).await
        }
        Err(OrderError::Validation(errors)) => errors_redirect(&session, errors, ORDERS_PATH).await,
        Err(OrderError::NotFound) => {
            flash_redirect(&session, FlashMessage::error("Order not found."), ORDERS_PATH).await
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, limit: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(str::to_owned),
            limit: limit.map(str::to_owned),
        }
    }

    #[test]
    fn test_defaults() {
        let p = Pagination::from_query(&PageQuery::default());
        assert_eq!(p, Pagination { page: 1, limit: 10 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let p = Pagination::from_query(&query(Some("0"), Some("abc")));
        assert_eq!(p, Pagination { page: 1, limit: 10 });

        let p = Pagination::from_query(&query(Some("-3"), Some("-1")));
        assert_eq!(p, Pagination { page: 1, limit: 10 });
    }

    #[test]
    fn test_limit_is_capped() {
        let p = Pagination::from_query(&query(Some("3"), Some("500")));
        assert_eq!(p.limit, MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 200);
    }

    #[test]
    fn test_total_pages() {
        let p = Pagination { page: 1, limit: 10 };
        assert_eq!(p.total_pages(0), 1);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
    }
}

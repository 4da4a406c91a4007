//! Admin dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;

use crate::db::StatsRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAdmin, take_flashes};
use crate::models::{CurrentAdmin, DashboardStats, FlashMessage};
use crate::state::AppState;

/// Dashboard page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub flashes: Vec<FlashMessage>,
    pub admin: CurrentAdmin,
    pub stats: DashboardStats,
}

/// Show catalog and order totals.
pub async fn dashboard(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
) -> Result<DashboardTemplate> {
    let stats = StatsRepository::new(state.pool()).dashboard().await?;

    Ok(DashboardTemplate {
        flashes: take_flashes(&session).await?,
        admin,
        stats,
    })
}

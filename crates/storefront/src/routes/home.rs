//! Public catalog page.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;

use crate::db::ItemRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::take_flashes;
use crate::models::{FlashMessage, Item};
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub flashes: Vec<FlashMessage>,
    pub items: Vec<Item>,
}

/// List every item that is not archived.
pub async fn index(State(state): State<AppState>, session: Session) -> Result<HomeTemplate> {
    let items = ItemRepository::new(state.pool()).list_public().await?;

    Ok(HomeTemplate {
        flashes: take_flashes(&session).await?,
        items,
    })
}

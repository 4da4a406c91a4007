//! Admin catalog management.
//!
//! Create and update arrive as `multipart/form-data` because they carry a
//! photo, so these handlers check the CSRF token themselves.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Query, State, multipart::MultipartError},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

use crochet_core::{ItemId, ItemStatus};

use crate::db::{ItemRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CSRF_FIELD, CsrfToken, RequireAdmin, csrf_rejection, take_flashes};
use crate::models::{CurrentAdmin, FlashMessage, Item};
use crate::routes::{errors_redirect, flash_redirect};
use crate::services::{ImageError, ItemError, ItemForm};
use crate::state::AppState;

const ADMIN_PATH: &str = "/admin";
const ITEMS_PATH: &str = "/admin/items";
const NEW_ITEM_PATH: &str = "/admin/items/new";

/// `?id=` query of the edit form.
#[derive(Debug, Deserialize)]
pub struct ItemIdQuery {
    #[serde(default)]
    pub id: String,
}

/// Delete form.
#[derive(Debug, Deserialize)]
pub struct DeleteItemForm {
    #[serde(default)]
    pub id: String,
}

/// A status choice in the item forms.
#[derive(Debug, Clone)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn status_options(current: ItemStatus) -> Vec<StatusOption> {
    ItemStatus::ALL
        .iter()
        .map(|s| StatusOption {
            value: s.as_str(),
            label: s.label(),
            selected: *s == current,
        })
        .collect()
}

/// All items, archived included.
#[derive(Template, WebTemplate)]
#[template(path = "admin/items.html")]
pub struct ItemsTemplate {
    pub flashes: Vec<FlashMessage>,
    pub admin: CurrentAdmin,
    pub csrf_token: String,
    pub items: Vec<Item>,
}

/// New item form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/item_new.html")]
pub struct NewItemTemplate {
    pub flashes: Vec<FlashMessage>,
    pub admin: CurrentAdmin,
    pub csrf_token: String,
    pub statuses: Vec<StatusOption>,
}

/// Edit item form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/item_edit.html")]
pub struct EditItemTemplate {
    pub flashes: Vec<FlashMessage>,
    pub admin: CurrentAdmin,
    pub csrf_token: String,
    pub item: Item,
    pub statuses: Vec<StatusOption>,
}

/// Fields read from an item form post.
#[derive(Debug, Default)]
struct ItemUpload {
    id: String,
    csrf_token: String,
    form: ItemForm,
    /// File name and bytes. An empty file part counts as no photo.
    image: Option<(String, Vec<u8>)>,
}

async fn read_upload(mut multipart: Multipart) -> std::result::Result<ItemUpload, MultipartError> {
    let mut upload = ItemUpload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    upload.image = Some((file_name, bytes.to_vec()));
                }
            }
            "id" => upload.id = field.text().await?,
            CSRF_FIELD => upload.csrf_token = field.text().await?,
            _ => {
                let value = field.text().await?;
                upload.form.set(&name, value);
            }
        }
    }

    Ok(upload)
}

/// Whether the posted token belongs to this session.
async fn csrf_valid(state: &AppState, session: &Session, token: &str) -> Result<bool> {
    state
        .csrf_key()
        .verify_session(session, token)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

fn parse_id(raw: &str) -> Option<ItemId> {
    raw.trim().parse::<i64>().ok().map(ItemId::new)
}

fn image_error_message(err: &ImageError) -> &'static str {
    match err {
        ImageError::UnsupportedFormat => {
            "Unsupported image format. Only PNG, JPG, JPEG are allowed."
        }
        ImageError::Decode(_) => "Failed to decode image.",
        ImageError::Io(_) => "Error saving image file.",
        ImageError::Encode(_) | ImageError::Worker(_) => "Error encoding image.",
    }
}

/// List every item.
pub async fn list(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    CsrfToken(csrf_token): CsrfToken,
) -> Result<ItemsTemplate> {
    let items = ItemRepository::new(state.pool()).list_all().await?;

    Ok(ItemsTemplate {
        flashes: take_flashes(&session).await?,
        admin,
        csrf_token,
        items,
    })
}

/// Show the new item form.
pub async fn new_form(
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    CsrfToken(csrf_token): CsrfToken,
) -> Result<NewItemTemplate> {
    Ok(NewItemTemplate {
        flashes: take_flashes(&session).await?,
        admin,
        csrf_token,
        statuses: status_options(ItemStatus::default()),
    })
}

/// Show the edit form for `?id=`.
pub async fn edit_form(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    CsrfToken(csrf_token): CsrfToken,
    Query(query): Query<ItemIdQuery>,
) -> Result<EditItemTemplate> {
    let id = parse_id(&query.id).ok_or_else(|| AppError::BadRequest("Invalid ID".to_owned()))?;
    let item = ItemRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_owned()))?;

    Ok(EditItemTemplate {
        flashes: take_flashes(&session).await?,
        admin,
        csrf_token,
        statuses: status_options(item.status),
        item,
    })
}

/// Create an item. A photo is required.
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response> {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected item upload");
            return flash_redirect(
                &session,
                FlashMessage::error("File too large. Max 10MB."),
                NEW_ITEM_PATH,
            )
            .await;
        }
    };

    if !csrf_valid(&state, &session, &upload.csrf_token).await? {
        return Ok(csrf_rejection());
    }

    let (mut input, (file_name, bytes)) = match (upload.form.validate(), upload.image) {
        (Ok(input), Some(image)) => (input, image),
        (result, image) => {
            let mut errors = match result {
                Ok(_) => Vec::new(),
                Err(ItemError::Validation(errors)) => errors,
                Err(e) => return Err(e.into()),
            };
            if image.is_none() {
                errors.push("Image file is required.".to_owned());
            }
            return errors_redirect(&session, errors, NEW_ITEM_PATH).await;
        }
    };

    let image_url = match state.images().save(&file_name, bytes).await {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(error = %e, "Item photo rejected");
            return flash_redirect(
                &session,
                FlashMessage::error(image_error_message(&e)),
                NEW_ITEM_PATH,
            )
            .await;
        }
    };
    input.image_url = Some(image_url);

    match ItemRepository::new(state.pool())
        .create(&input, Utc::now())
        .await
    {
        Ok(id) => {
            tracing::info!(admin = %admin.username, item_id = %id, "Item created");
            flash_redirect(
                &session,
                FlashMessage::success("Item added successfully!"),
                ADMIN_PATH,
            )
            .await
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save item");
            flash_redirect(
                &session,
                FlashMessage::error("Error saving item to database."),
                NEW_ITEM_PATH,
            )
            .await
        }
    }
}

/// Update an item. The photo is replaced only when a new one is uploaded.
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response> {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected item upload");
            return flash_redirect(&session, FlashMessage::error("File too large."), ADMIN_PATH)
                .await;
        }
    };

    if !csrf_valid(&state, &session, &upload.csrf_token).await? {
        return Ok(csrf_rejection());
    }

    let Some(id) = parse_id(&upload.id) else {
        return flash_redirect(&session, FlashMessage::error("Invalid ID."), ITEMS_PATH).await;
    };
    let edit_path = format!("{ITEMS_PATH}/edit?id={id}");

    let mut input = match upload.form.validate() {
        Ok(input) => input,
        Err(ItemError::Validation(errors)) => {
            return errors_redirect(&session, errors, &edit_path).await;
        }
        Err(e) => return Err(e.into()),
    };

    if let Some((file_name, bytes)) = upload.image {
        match state.images().save(&file_name, bytes).await {
            Ok(url) => input.image_url = Some(url),
            Err(e) => {
                tracing::warn!(error = %e, item_id = %id, "Item photo rejected");
                let message = match e {
                    ImageError::UnsupportedFormat => "Unsupported image format.",
                    ref other => image_error_message(other),
                };
                return flash_redirect(&session, FlashMessage::error(message), &edit_path).await;
            }
        }
    }

    match ItemRepository::new(state.pool()).update(id, &input).await {
        Ok(()) => {
            tracing::info!(admin = %admin.username, item_id = %id, "Item updated");
            flash_redirect(
                &session,
                FlashMessage::success("Item updated successfully!"),
                ADMIN_PATH,
            )
            .await
        }
        Err(RepositoryError::NotFound) => {
            flash_redirect(&session, FlashMessage::error("Item not found."), ITEMS_PATH).await
        }
        Err(e) => {
            tracing::error!(error = %e, item_id = %id, "Failed to update item");
            flash_redirect(&session, FlashMessage::error("Error updating item."), &edit_path).await
        }
    }
}

/// Delete an item. Its orders keep their copied details.
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<DeleteItemForm>,
) -> Result<Response> {
    let Some(id) = parse_id(&form.id) else {
        return flash_redirect(&session, FlashMessage::error("Invalid ID."), ADMIN_PATH).await;
    };

    let flash = match ItemRepository::new(state.pool()).delete(id).await {
        Ok(true) => {
            tracing::info!(admin = %admin.username, item_id = %id, "Item deleted");
            FlashMessage::success("Item deleted successfully!")
        }
        Ok(false) => FlashMessage::error("Item not found."),
        Err(e) => {
            tracing::error!(error = %e, item_id = %id, "Failed to delete item");
            FlashMessage::error("Error deleting item.")
        }
    };
    flash_redirect(&session, flash, ADMIN_PATH).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_options_mark_current() {
        let options = status_options(ItemStatus::OutOfStock);
        let values: Vec<_> = options.iter().map(|o| o.value).collect();
        assert_eq!(values, ["available", "out_of_stock", "archived"]);

        let selected: Vec<_> = options.iter().filter(|o| o.selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].label, "Out of stock");
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(" 7 "), Some(ItemId::new(7)));
        assert_eq!(parse_id("seven"), None);
        assert_eq!(parse_id(""), None);
    }

    #[test]
    fn test_image_error_messages() {
        assert_eq!(
            image_error_message(&ImageError::UnsupportedFormat),
            "Unsupported image format. Only PNG, JPG, JPEG are allowed."
        );
        assert_eq!(
            image_error_message(&ImageError::Decode("bad".to_owned())),
            "Failed to decode image."
        );
        assert_eq!(
            image_error_message(&ImageError::Worker("gone".to_owned())),
            "Error encoding image."
        );
    }
}

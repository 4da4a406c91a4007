//! Catalog item form validation.

use thiserror::Error;

use crochet_core::{ItemStatus, Price, PriceError};

use super::images::ImageError;
use crate::db::RepositoryError;
use crate::models::ItemInput;

/// Errors from item management.
#[derive(Debug, Error)]
pub enum ItemError {
    /// One or more form fields are invalid. Each entry is user-facing.
    #[error("invalid item form: {}", .0.join(" "))]
    Validation(Vec<String>),

    /// The uploaded photo could not be processed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Raw text fields of the admin item form. The photo arrives separately.
#[derive(Debug, Clone, Default)]
pub struct ItemForm {
    pub title: String,
    pub description: String,
    pub price: String,
    pub delivery_time: String,
    pub status: String,
}

impl ItemForm {
    /// Set a field by its form name. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        match name {
            "title" => self.title = value,
            "description" => self.description = value,
            "price" => self.price = value,
            "delivery_time" => self.delivery_time = value,
            "status" => self.status = value,
            _ => {}
        }
    }

    /// Validate into an [`ItemInput`] without an image.
    ///
    /// A blank status means `available`.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::Validation` listing every invalid field.
    pub fn validate(&self) -> Result<ItemInput, ItemError> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push("Title is required.".to_owned());
        }

        let price = if self.price.trim().is_empty() {
            errors.push("Price is required.".to_owned());
            None
        } else {
            match Price::parse(&self.price) {
                Ok(price) => Some(price),
                Err(PriceError::Invalid) => {
                    errors.push("Invalid price format.".to_owned());
                    None
                }
                Err(PriceError::NotPositive) => {
                    errors.push("Price must be positive.".to_owned());
                    None
                }
            }
        };

        let delivery_time = self.delivery_time.trim();
        if delivery_time.is_empty() {
            errors.push("Delivery time is required.".to_owned());
        }

        let status = match self.status.trim() {
            "" => Some(ItemStatus::default()),
            s => s.parse::<ItemStatus>().ok(),
        };
        if status.is_none() {
            errors.push("Invalid status selected.".to_owned());
        }

        match (price, status) {
            (Some(price), Some(status)) if errors.is_empty() => Ok(ItemInput {
                title: title.to_owned(),
                description: self.description.trim().to_owned(),
                price,
                delivery_time: delivery_time.to_owned(),
                status,
                image_url: None,
            }),
            _ => Err(ItemError::Validation(errors)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid() -> ItemForm {
        ItemForm {
            title: " Bunny ".to_owned(),
            description: "Soft".to_owned(),
            price: "19.99".to_owned(),
            delivery_time: "2 weeks".to_owned(),
            status: "out_of_stock".to_owned(),
        }
    }

    #[test]
    fn test_valid_form() {
        let input = valid().validate().unwrap();
        assert_eq!(input.title, "Bunny");
        assert_eq!(input.price.to_string(), "19.99");
        assert_eq!(input.status, ItemStatus::OutOfStock);
        assert!(input.image_url.is_none());
    }

    #[test]
    fn test_blank_status_defaults_to_available() {
        let form = ItemForm {
            status: String::new(),
            ..valid()
        };
        assert_eq!(form.validate().unwrap().status, ItemStatus::Available);
    }

    #[test]
    fn test_price_messages() {
        for (raw, expected) in [
            ("", "Price is required."),
            ("abc", "Invalid price format."),
            ("0", "Price must be positive."),
            ("-2", "Price must be positive."),
        ] {
            let form = ItemForm {
                price: raw.to_owned(),
                ..valid()
            };
            let Err(ItemError::Validation(errors)) = form.validate() else {
                panic!("price {raw:?} accepted");
            };
            assert_eq!(errors, vec![expected]);
        }
    }

    #[test]
    fn test_collects_all_errors() {
        let form = ItemForm {
            status: "sold".to_owned(),
            ..ItemForm::default()
        };
        let Err(ItemError::Validation(errors)) = form.validate() else {
            panic!("empty form accepted");
        };
        assert_eq!(
            errors,
            vec![
                "Title is required.",
                "Price is required.",
                "Delivery time is required.",
                "Invalid status selected.",
            ]
        );
    }

    #[test]
    fn test_set_ignores_unknown_fields() {
        let mut form = ItemForm::default();
        form.set("title", "Hat".to_owned());
        form.set("csrf_token", "abc".to_owned());
        assert_eq!(form.title, "Hat");
    }
}

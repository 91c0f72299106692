//! Item records and request payloads

use crate::error::ValidationErrors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const NAME_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// A stored item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub quantity: u64,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a new item
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub quantity: u64,
    pub tags: Vec<String>,
}

/// Validated partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub price: Option<f64>,
    pub quantity: Option<u64>,
    pub tags: Option<Vec<String>>,
}

impl ItemPatch {
    pub(crate) fn apply(self, item: &mut Item) {
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(description) = self.description {
            item.description = description;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(tags) = self.tags {
            item.tags = tags;
        }
    }
}

/// `POST /api/v1/items` body. Every field is optional at the wire level so that
/// a missing field is reported alongside every other field error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateItem {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub tags: Option<Vec<String>>,
}

impl CreateItem {
    pub fn validate(self) -> Result<NewItem, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = match self.name {
            Some(name) => check_name(name, &mut errors),
            None => {
                errors.add("name", "field required");
                None
            }
        };
        let price = match self.price {
            Some(price) => check_price(price, &mut errors),
            None => {
                errors.add("price", "field required");
                None
            }
        };
        let description = self
            .description
            .and_then(|d| check_description(d, &mut errors));
        let quantity = match self.quantity {
            Some(q) => check_quantity(q, &mut errors),
            None => Some(0),
        };

        match (name, price, quantity) {
            (Some(name), Some(price), Some(quantity)) if errors.is_empty() => Ok(NewItem {
                name,
                description,
                price,
                quantity,
                tags: self.tags.unwrap_or_default(),
            }),
            _ => Err(errors),
        }
    }
}

/// `PUT /api/v1/items/{id}` body
///
/// Only fields present in the body are applied. An explicit `null`
/// description clears it, an absent one leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateItem {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub tags: Option<Vec<String>>,
}

impl UpdateItem {
    pub fn validate(self) -> Result<ItemPatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let patch = ItemPatch {
            name: self.name.and_then(|n| check_name(n, &mut errors)),
            description: match self.description {
                Some(Some(d)) => check_description(d, &mut errors).map(Some),
                Some(None) => Some(None),
                None => None,
            },
            price: self.price.and_then(|p| check_price(p, &mut errors)),
            quantity: self.quantity.and_then(|q| check_quantity(q, &mut errors)),
            tags: self.tags,
        };

        errors.into_result(patch)
    }
}

/// Wraps whatever the field held, `null` included, so presence is visible
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn check_name(name: String, errors: &mut ValidationErrors) -> Option<String> {
    if name.trim().is_empty() {
        errors.add("name", "must not be empty");
        None
    } else if name.chars().count() > NAME_MAX_CHARS {
        errors.add("name", format!("must be at most {NAME_MAX_CHARS} characters"));
        None
    } else {
        Some(name)
    }
}

fn check_description(description: String, errors: &mut ValidationErrors) -> Option<String> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        errors.add(
            "description",
            format!("must be at most {DESCRIPTION_MAX_CHARS} characters"),
        );
        None
    } else {
        Some(description)
    }
}

fn check_price(price: f64, errors: &mut ValidationErrors) -> Option<f64> {
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        errors.add("price", "must be greater than 0");
        None
    }
}

fn check_quantity(quantity: i64, errors: &mut ValidationErrors) -> Option<u64> {
    match u64::try_from(quantity) {
        Ok(q) => Some(q),
        Err(_) => {
            errors.add("quantity", "must be greater than or equal to 0");
            None
        }
    }
}

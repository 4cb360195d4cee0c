//! Menu items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bukka_core::{Category, CurrencyCode, ItemId, Price};

use super::money;
use crate::platform::{Document, Fields, PlatformError};

/// A menu item as listed in the catalog. Read-only for the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoodItem {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub price: Price,
    pub image_url: Option<String>,
    /// Unavailable items are listed but cannot be added to a cart.
    pub available: bool,
}

/// Stored layout of a `food-items` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodItemRecord {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Category", default)]
    pub category: String,
    #[serde(rename = "Price", with = "money::amount")]
    pub price: Decimal,
    #[serde(rename = "imageURL", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "Available", default = "default_available")]
    pub available: bool,
}

const fn default_available() -> bool {
    true
}

impl FoodItem {
    /// Decode a `food-items` document.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::InvalidDocument` if the id or fields are malformed.
    pub fn from_document(doc: &Document, currency: CurrencyCode) -> Result<Self, PlatformError> {
        let id = ItemId::parse(&doc.id)
            .map_err(|e| PlatformError::InvalidDocument(format!("{}: {e}", doc.id)))?;
        let record: FoodItemRecord = doc.decode()?;
        if record.price.is_sign_negative() && !record.price.is_zero() {
            return Err(PlatformError::InvalidDocument(format!(
                "{}: negative price",
                doc.id
            )));
        }

        Ok(Self {
            id,
            name: record.name,
            description: record.description,
            category: Category::new(&record.category),
            price: Price::new(record.price, currency),
            image_url: record.image_url.filter(|u| !u.is_empty()),
            available: record.available,
        })
    }

    /// Case-insensitive substring match on the name.
    #[must_use]
    pub fn name_contains(&self, needle_lowercase: &str) -> bool {
        self.name.to_lowercase().contains(needle_lowercase)
    }
}

impl FoodItemRecord {
    /// Document fields for writing this record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not serialize to a JSON object.
    pub fn to_fields(&self) -> Result<Fields, PlatformError> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(PlatformError::InvalidDocument(format!(
                "expected object, got {other}"
            ))),
        }
    }
}

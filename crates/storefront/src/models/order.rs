//! Past orders shown in the profile.
//!
//! Orders are written by the fulfilment side; the core only reads them and
//! attaches reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use bukka_core::{OrderId, OrderStatus};

use super::money;
use crate::platform::{Document, PlatformError};

/// One ordered item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

/// An entry of the order history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub id: OrderId,
    pub items: Vec<OrderItem>,
    pub total: Option<Decimal>,
    pub status: OrderStatus,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRecord {
    #[serde(default)]
    items: Vec<OrderItem>,
    #[serde(default, with = "money::optional_amount")]
    total: Option<Decimal>,
    #[serde(default)]
    status: Option<OrderStatus>,
    #[serde(default)]
    created_at: Option<Value>,
}

impl OrderSummary {
    /// Decode an `orders` document. Missing status reads as pending.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::InvalidDocument` if the document is malformed.
    pub fn from_document(doc: &Document) -> Result<Self, PlatformError> {
        let id = OrderId::parse(&doc.id)
            .map_err(|e| PlatformError::InvalidDocument(format!("{}: {e}", doc.id)))?;
        let record: OrderRecord = doc.decode()?;
        Ok(Self {
            id,
            items: record.items,
            total: record.total,
            status: record.status.unwrap_or_default(),
            created_at: record
                .created_at
                .as_ref()
                .and_then(Value::as_str)
                .and_then(parse_timestamp),
        })
    }

    /// Short reference shown to customers: last five id characters, uppercased.
    #[must_use]
    pub fn reference(&self) -> String {
        let id = self.id.as_str();
        let start = id
            .char_indices()
            .rev()
            .nth(4)
            .map_or(0, |(i, _)| i);
        format!("#{}", id[start..].to_uppercase())
    }

    /// "Jollof Rice × 2, Zobo × 1"
    #[must_use]
    pub fn items_label(&self) -> String {
        self.items
            .iter()
            .map(|i| format!("{} × {}", i.name, i.quantity))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parse a stored RFC 3339 timestamp.
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

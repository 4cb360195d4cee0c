//! Cart lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bukka_core::{CurrencyCode, ItemId, Price};

use super::money;
use crate::platform::{Document, Fields, PlatformError};

/// One line of a user's cart, stored at `users/{uid}/cart/{itemId}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub item_id: ItemId,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    /// Variant label chosen when adding (e.g. "Regular", "Vegan").
    pub variant: String,
    pub instructions: Option<String>,
    pub quantity: u32,
}

/// Stored layout of a cart line document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartLineRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(with = "money::amount")]
    price: Decimal,
    #[serde(rename = "type", default)]
    variant: String,
    #[serde(default)]
    instructions: Option<String>,
    quantity: u32,
}

impl CartLine {
    /// Decode a cart line document.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::InvalidDocument` if the line is malformed, has
    /// a zero quantity or a negative price.
    pub fn from_document(doc: &Document) -> Result<Self, PlatformError> {
        let item_id = ItemId::parse(&doc.id)
            .map_err(|e| PlatformError::InvalidDocument(format!("{}: {e}", doc.id)))?;
        let record: CartLineRecord = doc.decode()?;
        if record.quantity == 0 {
            return Err(PlatformError::InvalidDocument(format!(
                "{}: zero quantity",
                doc.id
            )));
        }
        if record.price.is_sign_negative() && !record.price.is_zero() {
            return Err(PlatformError::InvalidDocument(format!(
                "{}: negative price",
                doc.id
            )));
        }
        Ok(Self {
            item_id,
            name: record.name,
            image_url: record.image_url,
            unit_price: record.price,
            variant: record.variant,
            instructions: record.instructions,
            quantity: record.quantity,
        })
    }

    /// Fields for a newly created line.
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".to_owned(), Value::String(self.name.clone()));
        fields.insert(
            "imageUrl".to_owned(),
            self.image_url.clone().map_or(Value::Null, Value::String),
        );
        fields.insert("price".to_owned(), money::to_value(self.unit_price));
        fields.insert("type".to_owned(), Value::String(self.variant.clone()));
        fields.insert(
            "instructions".to_owned(),
            self.instructions.clone().map_or(Value::Null, Value::String),
        );
        fields.insert("quantity".to_owned(), Value::from(self.quantity));
        fields
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Sum of unit price times quantity over all lines. Zero for an empty cart.
#[must_use]
pub fn compute_total(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::subtotal).sum()
}

/// Totals for showing a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSummary {
    /// Distinct lines.
    pub lines: usize,
    /// Sum of quantities.
    pub items: u64,
    pub total: Price,
}

impl CartSummary {
    #[must_use]
    pub fn of(lines: &[CartLine], currency: CurrencyCode) -> Self {
        Self {
            lines: lines.len(),
            items: lines.iter().map(|l| u64::from(l.quantity)).sum(),
            total: Price::new(compute_total(lines), currency),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn line(id: &str, price: i64, quantity: u32) -> CartLine {
        CartLine {
            item_id: ItemId::parse(id).unwrap(),
            name: id.to_string(),
            image_url: None,
            unit_price: Decimal::from(price),
            variant: "Regular".to_string(),
            instructions: None,
            quantity,
        }
    }

    #[test]
    fn test_compute_total() {
        assert_eq!(compute_total(&[]), Decimal::ZERO);
        assert_eq!(
            compute_total(&[line("a", 1000, 2), line("b", 500, 1)]),
            Decimal::from(2500)
        );
    }

    #[test]
    fn test_summary_display() {
        let summary = CartSummary::of(
            &[line("a", 1000, 2), line("b", 500, 1)],
            CurrencyCode::NGN,
        );
        assert_eq!(summary.lines, 2);
        assert_eq!(summary.items, 3);
        assert_eq!(summary.total.display(), "₦2,500.00");
    }

    #[test]
    fn test_line_document_layout() {
        let fields = line("suya", 1500, 1).to_fields();
        assert_eq!(fields["type"], json!("Regular"));
        assert_eq!(fields["price"], json!(1500));
        assert_eq!(fields["instructions"], json!(null));

        let decoded = CartLine::from_document(&Document {
            id: "suya".to_string(),
            fields,
        })
        .unwrap();
        assert_eq!(decoded, line("suya", 1500, 1));
    }

    #[test]
    fn test_string_price_from_older_clients() {
        let decoded = CartLine::from_document(&Document {
            id: "zobo".to_string(),
            fields: json!({"name": "Zobo", "price": "800", "type": "Regular", "quantity": 3})
                .as_object()
                .cloned()
                .unwrap(),
        })
        .unwrap();
        assert_eq!(decoded.subtotal(), Decimal::from(2400));
    }

    #[test]
    fn test_rejects_negative_price() {
        let err = CartLine::from_document(&Document {
            id: "suya".to_string(),
            fields: json!({"name": "Suya", "price": -1500, "type": "Regular", "quantity": 1})
                .as_object()
                .cloned()
                .unwrap(),
        })
        .unwrap_err();
        assert!(matches!(err, PlatformError::InvalidDocument(_)));
    }
}

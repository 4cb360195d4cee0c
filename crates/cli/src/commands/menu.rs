//! Menu commands.
//!
//! # Menu file format
//!
//! ```yaml
//! - id: jollof-rice
//!   name: Jollof Rice
//!   description: Smoky party jollof with fried plantain
//!   category: Main
//!   price: 2500
//!   image_url: https://cdn.example.com/jollof.jpg
//! ```
//!
//! `available` defaults to `true`.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use bukka_core::{Category, ItemId};
use bukka_storefront::error::AppError;
use bukka_storefront::models::{FoodItem, FoodItemRecord};
use bukka_storefront::state::AppState;

use super::{CliError, Credentials, sign_in};

/// One entry of the menu file.
#[derive(Debug, Deserialize)]
struct MenuEntry {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    category: String,
    price: Decimal,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default = "default_available")]
    available: bool,
}

const fn default_available() -> bool {
    true
}

fn log_items(items: &[FoodItem]) {
    if items.is_empty() {
        info!("No items found");
        return;
    }
    for item in items {
        let flag = if item.available { "" } else { " (unavailable)" };
        info!(
            "{:<16} {:<24} {}{flag}",
            item.id.as_str(),
            item.name,
            item.price.display()
        );
    }
}

/// List a category.
///
/// # Errors
///
/// Never fails; read errors show as an empty list.
pub async fn list(state: &AppState, category: &str) -> Result<(), CliError> {
    let items = state.catalog().list_by_category(&Category::new(category)).await;
    log_items(&items);
    Ok(())
}

/// Search item names.
///
/// # Errors
///
/// Never fails; read errors show as an empty list.
pub async fn search(state: &AppState, term: &str, category: Option<&str>) -> Result<(), CliError> {
    let category = category.map(Category::new);
    let outcome = state.catalog().search(term, category.as_ref()).await;
    log_items(&outcome.into_results().unwrap_or_default());
    Ok(())
}

fn validate(entries: &[MenuEntry]) -> Vec<String> {
    let mut errors = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        if ItemId::parse(&entry.id).is_err() {
            errors.push(format!("entry {index}: invalid id '{}'", entry.id));
        }
        if entry.name.trim().is_empty() {
            errors.push(format!("{}: missing name", entry.id));
        }
        if entry.price.is_sign_negative() && !entry.price.is_zero() {
            errors.push(format!("{}: negative price", entry.id));
        }
    }
    errors
}

/// Seed menu items from a YAML file.
///
/// Signs in first when credentials are given, for stores whose rules only
/// let signed-in users write.
///
/// # Errors
///
/// Returns an error if the file can't be read or validated, or a write fails.
pub async fn seed(state: &AppState, credentials: &Credentials, file: &Path) -> Result<(), CliError> {
    info!(path = %file.display(), "Loading menu from file");
    let content = tokio::fs::read_to_string(file).await?;
    let entries: Vec<MenuEntry> = serde_yaml::from_str(&content)?;

    let errors = validate(&entries);
    if !errors.is_empty() {
        for err in &errors {
            warn!("  - {err}");
        }
        return Err(AppError::Validation(format!("{} invalid menu entries", errors.len())).into());
    }

    if credentials.given() {
        sign_in(state, credentials).await?;
    }

    let items = entries
        .into_iter()
        .map(|entry| {
            let id = ItemId::parse(&entry.id).map_err(|e| CliError::InvalidId(e.to_string()))?;
            Ok((
                id,
                FoodItemRecord {
                    name: entry.name.trim().to_owned(),
                    description: entry.description,
                    category: Category::new(&entry.category).as_str().to_owned(),
                    price: entry.price,
                    image_url: entry.image_url,
                    available: entry.available,
                },
            ))
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    let written = state
        .catalog()
        .seed(&items)
        .await
        .map_err(|e| AppError::from(e).report())?;
    info!(written, "Menu seeded");
    Ok(())
}

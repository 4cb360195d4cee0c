//! Cache types for catalog reads.

use std::sync::Arc;

use crate::models::FoodItem;

/// Cache key for catalog snapshots.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CatalogKey {
    /// Every item in `food-items`.
    FullMenu,
}

/// Cached value types.
pub type CatalogValue = Arc<Vec<FoodItem>>;

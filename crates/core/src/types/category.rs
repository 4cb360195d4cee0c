//! Menu category.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A menu category such as "Main", "Snacks" or "Drinks".
///
/// Categories are free-form labels owned by whoever curates the menu, so this
/// is a thin wrapper rather than an enum: an unknown category is valid and
/// simply has no items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub const MAIN: &'static str = "Main";
    pub const SNACKS: &'static str = "Snacks";
    pub const DRINKS: &'static str = "Drinks";

    /// Create a category from a label. Surrounding whitespace is dropped.
    #[must_use]
    pub fn new(label: &str) -> Self {
        Self(label.trim().to_owned())
    }

    /// The categories shown on the menu page, in display order.
    #[must_use]
    pub fn menu_sections() -> [Self; 3] {
        [
            Self::new(Self::MAIN),
            Self::new(Self::SNACKS),
            Self::new(Self::DRINKS),
        ]
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims() {
        assert_eq!(Category::new("  Snacks ").as_str(), "Snacks");
    }

    #[test]
    fn test_menu_sections_order() {
        let labels: Vec<String> = Category::menu_sections()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(labels, ["Main", "Snacks", "Drinks"]);
    }
}

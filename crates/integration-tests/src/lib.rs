//! Integration tests for Bukka.
//!
//! Every test runs the real services over the in-memory platform, so no
//! network or hosted project is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bukka-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_flow` - Add/merge, remove, checkout and live cart behaviour
//! - `catalog_search` - Category listing and debounced search
//! - `profile_sections` - Section-scoped saves and credential changes
//! - `auth_flow` - Registration and sign-in

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use secrecy::SecretString;

use bukka_core::ItemId;
use bukka_storefront::config::ClientSettings;
use bukka_storefront::models::{FoodItem, FoodItemRecord};
use bukka_storefront::platform::memory::MemoryPlatform;
use bukka_storefront::platform::{AuthUser, Platform};
use bukka_storefront::state::AppState;

/// Password used for every test account.
pub const PASSWORD: &str = "jollof-rice";

/// Menu written by [`TestContext::with_menu`]: id, name, category, price.
pub const MENU: &[(&str, &str, &str, i64)] = &[
    ("jollof-rice", "Jollof Rice", "Main", 2500),
    ("fried-rice", "Fried Rice", "Main", 2300),
    ("egusi-soup", "Egusi Soup", "Main", 3200),
    ("puff-puff", "Puff Puff", "Snacks", 500),
    ("suya", "Suya", "Snacks", 1500),
    ("zobo", "Zobo", "Drinks", 800),
];

/// Application state over a fresh in-memory platform.
pub struct TestContext {
    pub state: AppState,
    pub memory: MemoryPlatform,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let (platform, memory) = Platform::memory();
        Self {
            state: AppState::new(platform, ClientSettings::default()),
            memory,
        }
    }

    /// A context whose catalog holds [`MENU`].
    pub async fn with_menu() -> Self {
        let ctx = Self::new();
        let items: Vec<_> = MENU
            .iter()
            .map(|(id, name, category, price)| {
                (
                    ItemId::parse(id).unwrap(),
                    FoodItemRecord {
                        name: (*name).to_string(),
                        description: String::new(),
                        category: (*category).to_string(),
                        price: Decimal::from(*price),
                        image_url: None,
                        available: true,
                    },
                )
            })
            .collect();
        ctx.state.catalog().seed(&items).await.unwrap();
        ctx
    }

    /// Register (and so sign in) an account.
    pub async fn register(&self, name: &str, email: &str) -> AuthUser {
        let password = SecretString::from(PASSWORD);
        self.state
            .auth()
            .register(name, email, &password, &password)
            .await
            .unwrap()
    }

    /// Sign in to an account created with [`TestContext::register`].
    pub async fn sign_in(&self, email: &str) -> AuthUser {
        self.state
            .auth()
            .sign_in(email, &SecretString::from(PASSWORD))
            .await
            .unwrap()
    }

    /// A menu item from the catalog.
    pub async fn item(&self, id: &str) -> FoodItem {
        self.state
            .catalog()
            .find_item(&ItemId::parse(id).unwrap())
            .await
            .unwrap()
            .unwrap()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

//! Domain models for the storefront.
//!
//! Each model owns the mapping between its stored document layout and the
//! typed value the services work with.

pub mod cart;
pub mod food;
pub mod money;
pub mod order;
pub mod profile;

pub use cart::{CartLine, CartSummary, compute_total};
pub use food::{FoodItem, FoodItemRecord};
pub use order::{OrderItem, OrderSummary};
pub use profile::{
    AccountSettings, CardDetails, DEFAULT_ADDRESS_LABEL, DELIVERY_COUNTRY, DeliveryAddress,
    DietaryPreferences, MobileWallet, OrderPreferences, PaymentPreferences, PersonalInfo,
    ProfileSection, ProfileSnapshot, SavedAddress,
};

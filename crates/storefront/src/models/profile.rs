//! Profile sections and the loaded profile view.

use chrono::{DateTime, Utc};

use bukka_core::{AddressId, DeliveryTime, Email, MobileProvider, PaymentMethod, SpiceLevel};

/// Country written on every delivery address.
pub const DELIVERY_COUNTRY: &str = "Nigeria";

/// Label of the saved address kept in sync with the default delivery address.
pub const DEFAULT_ADDRESS_LABEL: &str = "Default";

/// Dietary flags under `preferences.dietaryPreferences`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DietaryPreferences {
    pub halal: bool,
    pub vegan: bool,
    pub gluten_free: bool,
    pub nut_allergy: bool,
}

/// Personal information section.
///
/// The email is not part of this section: it changes only through
/// [`change_email`](crate::profile::ProfileStore::change_email), which keeps
/// the auth record and the mirrored `personal.email` together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonalInfo {
    pub full_name: String,
    pub phone_number: String,
    pub dietary: DietaryPreferences,
}

/// Default delivery address section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryAddress {
    pub street: String,
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub landmark: Option<String>,
    pub delivery_instructions: Option<String>,
}

/// Order preferences section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPreferences {
    pub spice_level: SpiceLevel,
    pub preferred_delivery_time: DeliveryTime,
    pub default_customizations: Option<String>,
    pub promo_code: Option<String>,
}

/// Saved card details. Only the last four digits are ever stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardDetails {
    pub last4: String,
    pub brand: String,
    /// `MM/YY`
    pub expiry: String,
}

/// Saved mobile wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileWallet {
    pub provider: Option<MobileProvider>,
    pub phone_number: String,
}

/// Payment preferences section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentPreferences {
    pub method: PaymentMethod,
    pub billing_address: Option<String>,
    /// Kept only when the method is card.
    pub card: Option<CardDetails>,
    /// Kept only when the method is mobile payment.
    pub mobile: Option<MobileWallet>,
}

/// Account settings section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSettings {
    pub username: String,
    pub newsletter_subscribed: bool,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            newsletter_subscribed: true,
        }
    }
}

/// One independently saved part of the profile document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSection {
    Personal(PersonalInfo),
    Delivery(DeliveryAddress),
    Order(OrderPreferences),
    Payment(PaymentPreferences),
    Account(AccountSettings),
}

impl ProfileSection {
    /// Short name for logs and messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Personal(_) => "personal",
            Self::Delivery(_) => "delivery",
            Self::Order(_) => "order",
            Self::Payment(_) => "payment",
            Self::Account(_) => "account",
        }
    }
}

/// The profile as loaded for display. Missing fields hold their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSnapshot {
    /// Mirrored email, falling back to the auth provider's.
    pub email: Option<Email>,
    pub personal: PersonalInfo,
    pub delivery: DeliveryAddress,
    pub order: OrderPreferences,
    pub payment: PaymentPreferences,
    pub account: AccountSettings,
    pub avatar_url: Option<String>,
    /// Stars (1-5) of the last rating given, 0 when never rated.
    pub last_order_rating: u8,
    pub member_since: Option<DateTime<Utc>>,
}

impl ProfileSnapshot {
    /// Defaults for a user with no profile document.
    #[must_use]
    pub fn empty(email: Option<Email>) -> Self {
        Self {
            email,
            personal: PersonalInfo::default(),
            delivery: DeliveryAddress::default(),
            order: OrderPreferences::default(),
            payment: PaymentPreferences::default(),
            account: AccountSettings::default(),
            avatar_url: None,
            last_order_rating: 0,
            member_since: None,
        }
    }

    /// "Mar 2025" style label for the member-since badge.
    #[must_use]
    pub fn member_since_label(&self) -> Option<String> {
        self.member_since.map(|d| d.format("%b %Y").to_string())
    }
}

/// An entry of `userAddresses/{uid}/addresses`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedAddress {
    pub id: AddressId,
    pub label: String,
    pub is_default: bool,
    pub address: DeliveryAddress,
}

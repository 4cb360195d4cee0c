//! Reading the profile document.
//!
//! Reads are lenient: a field that is missing or has the wrong type holds its
//! default, so profiles written by older clients still load.

use serde::de::DeserializeOwned;
use serde_json::Value;

use bukka_core::{AddressId, Email};

use crate::models::order::parse_timestamp;
use crate::models::{
    AccountSettings, CardDetails, DeliveryAddress, DietaryPreferences, MobileWallet,
    OrderPreferences, PaymentPreferences, PersonalInfo, ProfileSnapshot, SavedAddress,
};
use crate::platform::document::get_path;
use crate::platform::{Document, Fields, PlatformError};

fn string(fields: &Fields, path: &str) -> String {
    optional_string(fields, path).unwrap_or_default()
}

fn optional_string(fields: &Fields, path: &str) -> Option<String> {
    get_path(fields, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn flag(fields: &Fields, path: &str, default: bool) -> bool {
    get_path(fields, path)
        .and_then(Value::as_bool)
        .unwrap_or(default)
}

fn choice<T: DeserializeOwned + Default>(fields: &Fields, path: &str) -> T {
    optional_choice(fields, path).unwrap_or_default()
}

fn optional_choice<T: DeserializeOwned>(fields: &Fields, path: &str) -> Option<T> {
    get_path(fields, path).and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Build the profile view from `users/{uid}`.
///
/// `provider_email` is used when the document has no mirrored email.
#[must_use]
pub fn read_profile(fields: Option<&Fields>, provider_email: Option<Email>) -> ProfileSnapshot {
    let Some(fields) = fields else {
        return ProfileSnapshot::empty(provider_email);
    };

    let email = optional_string(fields, "personal.email")
        .or_else(|| optional_string(fields, "email"))
        .and_then(|e| Email::parse(&e).ok())
        .or(provider_email);

    ProfileSnapshot {
        email,
        personal: read_personal(fields),
        delivery: read_address(fields, "defaultDeliveryAddress"),
        order: OrderPreferences {
            spice_level: choice(fields, "orderPreferences.spiceLevel"),
            preferred_delivery_time: choice(fields, "orderPreferences.preferredDeliveryTime"),
            default_customizations: optional_string(
                fields,
                "orderPreferences.defaultCustomizations",
            ),
            promo_code: optional_string(fields, "preferences.promoCode"),
        },
        payment: read_payment(fields),
        account: AccountSettings {
            username: string(fields, "account.username"),
            newsletter_subscribed: flag(fields, "preferences.newsletterSubscribed", true),
        },
        avatar_url: optional_string(fields, "avatarUrl"),
        last_order_rating: get_path(fields, "lastOrderRating")
            .and_then(Value::as_u64)
            .and_then(|r| u8::try_from(r).ok())
            .filter(|r| (1..=5).contains(r))
            .unwrap_or(0),
        member_since: optional_string(fields, "account.createdAt")
            .or_else(|| optional_string(fields, "createdAt"))
            .and_then(|t| parse_timestamp(&t)),
    }
}

fn read_personal(fields: &Fields) -> PersonalInfo {
    let dietary = "preferences.dietaryPreferences";
    PersonalInfo {
        full_name: optional_string(fields, "personal.fullName")
            .or_else(|| optional_string(fields, "name"))
            .unwrap_or_default(),
        phone_number: string(fields, "personal.phoneNumber"),
        dietary: DietaryPreferences {
            halal: flag(fields, &format!("{dietary}.halal"), false),
            vegan: flag(fields, &format!("{dietary}.vegan"), false),
            gluten_free: flag(fields, &format!("{dietary}.glutenFree"), false),
            nut_allergy: flag(fields, &format!("{dietary}.nutAllergy"), false),
        },
    }
}

/// Read an address under `prefix`, or from the top level when `prefix` is empty.
fn read_address(fields: &Fields, prefix: &str) -> DeliveryAddress {
    let path = |key: &str| {
        if prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{prefix}.{key}")
        }
    };
    DeliveryAddress {
        street: string(fields, &path("street")),
        apartment: optional_string(fields, &path("apartment")),
        city: string(fields, &path("city")),
        state: string(fields, &path("state")),
        postal_code: string(fields, &path("postalCode")),
        landmark: optional_string(fields, &path("landmark")),
        delivery_instructions: optional_string(fields, &path("deliveryInstructions")),
    }
}

fn read_payment(fields: &Fields) -> PaymentPreferences {
    let card = get_path(fields, "savedPayment.card")
        .filter(|v| v.is_object())
        .map(|_| CardDetails {
            last4: string(fields, "savedPayment.card.last4"),
            brand: string(fields, "savedPayment.card.brand"),
            expiry: string(fields, "savedPayment.card.expiry"),
        });
    let mobile = get_path(fields, "savedPayment.mobile")
        .filter(|v| v.is_object())
        .map(|_| MobileWallet {
            provider: optional_choice(fields, "savedPayment.mobile.provider"),
            phone_number: string(fields, "savedPayment.mobile.phoneNumber"),
        });

    PaymentPreferences {
        method: choice(fields, "savedPayment.method"),
        billing_address: optional_string(fields, "savedPayment.billingAddress"),
        card,
        mobile,
    }
}

/// Decode an entry of `userAddresses/{uid}/addresses`.
///
/// # Errors
///
/// Returns `PlatformError::InvalidDocument` if the id is not a valid address id.
pub fn read_saved_address(doc: &Document) -> Result<SavedAddress, PlatformError> {
    let id = AddressId::parse(&doc.id)
        .map_err(|e| PlatformError::InvalidDocument(format!("{}: {e}", doc.id)))?;
    Ok(SavedAddress {
        id,
        label: string(&doc.fields, "label"),
        is_default: flag(&doc.fields, "isDefault", false),
        address: read_address(&doc.fields, ""),
    })
}

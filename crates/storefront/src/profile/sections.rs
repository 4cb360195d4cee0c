//! Field layout of each profile section.
//!
//! A section owns a fixed set of field paths on `users/{uid}`. Saving a
//! section merges exactly the leaf paths built here, so sections never
//! overwrite each other.

use serde::Serialize;
use serde_json::Value;

use bukka_core::PaymentMethod;

use crate::error::{AppError, Result};
use crate::models::{
    AccountSettings, DELIVERY_COUNTRY, DeliveryAddress, OrderPreferences, PaymentPreferences,
    PersonalInfo, ProfileSection,
};
use crate::platform::Fields;
use crate::platform::document::{set_path, timestamp_now};

/// Fields to merge for a section, including `updatedAt`.
///
/// # Errors
///
/// Returns `AppError::Validation` if the section content is rejected.
pub fn section_fields(section: &ProfileSection) -> Result<Fields> {
    let mut fields = Fields::new();
    match section {
        ProfileSection::Personal(personal) => personal_fields(&mut fields, personal),
        ProfileSection::Delivery(address) => {
            validate_address(address)?;
            address_fields(&mut fields, "defaultDeliveryAddress", address);
        }
        ProfileSection::Order(order) => order_fields(&mut fields, order),
        ProfileSection::Payment(payment) => payment_fields(&mut fields, payment)?,
        ProfileSection::Account(account) => account_fields(&mut fields, account)?,
    }
    fields.insert("updatedAt".to_owned(), timestamp_now());
    Ok(fields)
}

fn text(value: &str) -> Value {
    Value::String(value.trim().to_owned())
}

/// Blank optional text is stored as null.
fn optional_text(value: Option<&str>) -> Value {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or(Value::Null, |v| Value::String(v.to_owned()))
}

/// Stored label of a profile enum.
fn label<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn personal_fields(fields: &mut Fields, personal: &PersonalInfo) {
    set_path(fields, "personal.fullName", text(&personal.full_name));
    set_path(fields, "personal.phoneNumber", text(&personal.phone_number));

    let dietary = &personal.dietary;
    for (key, flag) in [
        ("halal", dietary.halal),
        ("vegan", dietary.vegan),
        ("glutenFree", dietary.gluten_free),
        ("nutAllergy", dietary.nut_allergy),
    ] {
        set_path(
            fields,
            &format!("preferences.dietaryPreferences.{key}"),
            Value::Bool(flag),
        );
    }
}

fn validate_address(address: &DeliveryAddress) -> Result<()> {
    let required = [&address.street, &address.city, &address.state];
    if required.iter().any(|v| v.trim().is_empty()) {
        return Err(AppError::Validation(
            "Please fill in the street, city and state.".to_string(),
        ));
    }
    Ok(())
}

/// Write an address under `prefix`, or at the top level when `prefix` is empty.
pub(crate) fn address_fields(fields: &mut Fields, prefix: &str, address: &DeliveryAddress) {
    let path = |key: &str| {
        if prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{prefix}.{key}")
        }
    };
    set_path(fields, &path("street"), text(&address.street));
    set_path(
        fields,
        &path("apartment"),
        optional_text(address.apartment.as_deref()),
    );
    set_path(fields, &path("city"), text(&address.city));
    set_path(fields, &path("state"), text(&address.state));
    set_path(fields, &path("postalCode"), text(&address.postal_code));
    set_path(
        fields,
        &path("landmark"),
        optional_text(address.landmark.as_deref()),
    );
    set_path(
        fields,
        &path("deliveryInstructions"),
        optional_text(address.delivery_instructions.as_deref()),
    );
    set_path(fields, &path("country"), Value::String(DELIVERY_COUNTRY.to_owned()));
}

fn order_fields(fields: &mut Fields, order: &OrderPreferences) {
    set_path(fields, "orderPreferences.spiceLevel", label(&order.spice_level));
    set_path(
        fields,
        "orderPreferences.preferredDeliveryTime",
        label(&order.preferred_delivery_time),
    );
    set_path(
        fields,
        "orderPreferences.defaultCustomizations",
        optional_text(order.default_customizations.as_deref()),
    );
    set_path(
        fields,
        "preferences.promoCode",
        optional_text(order.promo_code.as_deref()),
    );
}

fn payment_fields(fields: &mut Fields, payment: &PaymentPreferences) -> Result<()> {
    set_path(fields, "savedPayment.method", label(&payment.method));
    set_path(
        fields,
        "savedPayment.billingAddress",
        optional_text(payment.billing_address.as_deref()),
    );

    match (&payment.method, &payment.card) {
        (PaymentMethod::Card, Some(card)) => {
            let last4 = card.last4.trim();
            if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
                return Err(AppError::Validation(
                    "Enter only the last 4 digits of the card.".to_string(),
                ));
            }
            set_path(fields, "savedPayment.card.last4", text(last4));
            set_path(fields, "savedPayment.card.brand", text(&card.brand));
            set_path(fields, "savedPayment.card.expiry", text(&card.expiry));
        }
        _ => set_path(fields, "savedPayment.card", Value::Null),
    }

    match (&payment.method, &payment.mobile) {
        (PaymentMethod::MobilePayment, Some(mobile)) => {
            set_path(
                fields,
                "savedPayment.mobile.provider",
                mobile.provider.as_ref().map_or(Value::Null, label),
            );
            set_path(
                fields,
                "savedPayment.mobile.phoneNumber",
                text(&mobile.phone_number),
            );
        }
        _ => set_path(fields, "savedPayment.mobile", Value::Null),
    }
    Ok(())
}

fn account_fields(fields: &mut Fields, account: &AccountSettings) -> Result<()> {
    let username = account.username.trim();
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(
            "Usernames cannot contain spaces.".to_string(),
        ));
    }
    set_path(fields, "account.username", text(username));
    set_path(
        fields,
        "preferences.newsletterSubscribed",
        Value::Bool(account.newsletter_subscribed),
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use bukka_core::{MobileProvider, SpiceLevel};

    use super::*;
    use crate::models::{CardDetails, MobileWallet};
    use crate::platform::FieldMask;

    fn paths(section: &ProfileSection) -> Vec<String> {
        FieldMask::leaves(&section_fields(section).unwrap())
            .iter()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_sections_touch_disjoint_paths() {
        let sections = [
            ProfileSection::Personal(PersonalInfo::default()),
            ProfileSection::Delivery(DeliveryAddress {
                street: "12 Allen Avenue".to_string(),
                city: "Ikeja".to_string(),
                state: "Lagos".to_string(),
                ..DeliveryAddress::default()
            }),
            ProfileSection::Order(OrderPreferences::default()),
            ProfileSection::Payment(PaymentPreferences::default()),
            ProfileSection::Account(AccountSettings::default()),
        ];
        let all: Vec<Vec<String>> = sections.iter().map(paths).collect();
        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i + 1) {
                let shared: Vec<_> = a
                    .iter()
                    .filter(|p| b.contains(p) && p.as_str() != "updatedAt")
                    .collect();
                assert!(shared.is_empty(), "sections share {shared:?}");
            }
        }
    }

    #[test]
    fn test_delivery_requires_street_city_state() {
        let err = section_fields(&ProfileSection::Delivery(DeliveryAddress::default())).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_delivery_sets_country() {
        let fields = section_fields(&ProfileSection::Delivery(DeliveryAddress {
            street: "12 Allen Avenue".to_string(),
            city: "Ikeja".to_string(),
            state: "Lagos".to_string(),
            landmark: Some("  ".to_string()),
            ..DeliveryAddress::default()
        }))
        .unwrap();
        assert_eq!(fields["defaultDeliveryAddress"]["country"], json!("Nigeria"));
        assert_eq!(fields["defaultDeliveryAddress"]["landmark"], json!(null));
    }

    #[test]
    fn test_order_labels() {
        let fields = section_fields(&ProfileSection::Order(OrderPreferences {
            spice_level: SpiceLevel::ExtraHot,
            promo_code: Some("JOLLOF10".to_string()),
            ..OrderPreferences::default()
        }))
        .unwrap();
        assert_eq!(fields["orderPreferences"]["spiceLevel"], json!("Extra Hot"));
        assert_eq!(fields["orderPreferences"]["preferredDeliveryTime"], json!("ASAP"));
        assert_eq!(fields["preferences"]["promoCode"], json!("JOLLOF10"));
    }

    #[test]
    fn test_payment_keeps_only_matching_details() {
        let fields = section_fields(&ProfileSection::Payment(PaymentPreferences {
            method: PaymentMethod::MobilePayment,
            billing_address: None,
            card: Some(CardDetails {
                last4: "4242".to_string(),
                brand: "Visa".to_string(),
                expiry: "04/27".to_string(),
            }),
            mobile: Some(MobileWallet {
                provider: Some(MobileProvider::MtnMoMo),
                phone_number: "08030000000".to_string(),
            }),
        }))
        .unwrap();
        assert_eq!(fields["savedPayment"]["card"], json!(null));
        assert_eq!(fields["savedPayment"]["mobile"]["provider"], json!("MTN MoMo"));
        assert_eq!(fields["savedPayment"]["method"], json!("Mobile Payment"));
    }

    #[test]
    fn test_card_last4_must_be_four_digits() {
        let err = section_fields(&ProfileSection::Payment(PaymentPreferences {
            card: Some(CardDetails {
                last4: "4242424242424242".to_string(),
                ..CardDetails::default()
            }),
            ..PaymentPreferences::default()
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_username_without_spaces() {
        let err = section_fields(&ProfileSection::Account(AccountSettings {
            username: "ada obi".to_string(),
            newsletter_subscribed: false,
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}

//! Profile saves and credential changes over the in-memory platform.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;

use bukka_core::{DeliveryTime, MobileProvider, PaymentMethod, SpiceLevel};
use bukka_integration_tests::{PASSWORD, TestContext};
use bukka_storefront::error::AppError;
use bukka_storefront::models::{
    AccountSettings, DeliveryAddress, MobileWallet, OrderPreferences, PaymentPreferences,
    PersonalInfo, ProfileSection,
};
use bukka_storefront::platform::memory::Operation;
use bukka_storefront::services::auth::AuthError;

fn address(street: &str) -> DeliveryAddress {
    DeliveryAddress {
        street: street.to_string(),
        apartment: Some("Flat 2".to_string()),
        city: "Ikeja".to_string(),
        state: "Lagos".to_string(),
        postal_code: "100271".to_string(),
        landmark: None,
        delivery_instructions: Some("Call at the gate".to_string()),
    }
}

fn mobile_payment() -> PaymentPreferences {
    PaymentPreferences {
        method: PaymentMethod::MobilePayment,
        billing_address: None,
        card: None,
        mobile: Some(MobileWallet {
            provider: Some(MobileProvider::PalmPay),
            phone_number: "08031234567".to_string(),
        }),
    }
}

#[tokio::test]
async fn test_new_user_profile_has_defaults() {
    let ctx = TestContext::new();
    let user = ctx.register("Ada Obi", "ada@example.com").await;

    let profile = ctx.state.profile().load_profile(&user).await.unwrap();
    assert_eq!(profile.personal.full_name, "Ada Obi");
    assert_eq!(profile.email.as_ref(), Some(&user.email));
    assert_eq!(profile.order.spice_level, SpiceLevel::Medium);
    assert!(profile.account.newsletter_subscribed);
    assert!(profile.member_since.is_some());
}

#[tokio::test]
async fn test_saving_delivery_leaves_payment_intact() {
    let ctx = TestContext::new();
    let user = ctx.register("Ada", "ada@example.com").await;
    let profiles = ctx.state.profile();

    profiles
        .save_section(&user.id, &ProfileSection::Payment(mobile_payment()))
        .await
        .unwrap();
    profiles
        .save_section(&user.id, &ProfileSection::Delivery(address("12 Allen Avenue")))
        .await
        .unwrap();

    let profile = profiles.load_profile(&user).await.unwrap();
    assert_eq!(profile.payment, mobile_payment());
    assert_eq!(profile.delivery, address("12 Allen Avenue"));
}

#[tokio::test]
async fn test_concurrent_saves_of_different_sections() {
    let ctx = TestContext::new();
    let user = ctx.register("Ada", "ada@example.com").await;
    let profiles = ctx.state.profile();

    let personal = ProfileSection::Personal(PersonalInfo {
        full_name: "Ada Obi".to_string(),
        phone_number: "08031234567".to_string(),
        ..PersonalInfo::default()
    });
    let order = ProfileSection::Order(OrderPreferences {
        spice_level: SpiceLevel::Hot,
        preferred_delivery_time: DeliveryTime::InOneHour,
        default_customizations: Some("No onions".to_string()),
        promo_code: None,
    });
    let account = ProfileSection::Account(AccountSettings {
        username: "ada_obi".to_string(),
        newsletter_subscribed: false,
    });

    let (a, b, c) = tokio::join!(
        profiles.save_section(&user.id, &personal),
        profiles.save_section(&user.id, &order),
        profiles.save_section(&user.id, &account),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let profile = profiles.load_profile(&user).await.unwrap();
    assert_eq!(profile.personal.phone_number, "08031234567");
    assert_eq!(profile.order.spice_level, SpiceLevel::Hot);
    assert_eq!(profile.order.default_customizations.as_deref(), Some("No onions"));
    assert_eq!(profile.account.username, "ada_obi");
    assert!(!profile.account.newsletter_subscribed);
}

#[tokio::test]
async fn test_default_address_follows_delivery_section() {
    let ctx = TestContext::new();
    let user = ctx.register("Ada", "ada@example.com").await;
    let profiles = ctx.state.profile();

    for street in ["12 Allen Avenue", "3 Adeola Odeku"] {
        profiles
            .save_section(&user.id, &ProfileSection::Delivery(address(street)))
            .await
            .unwrap();
    }

    let saved = profiles.saved_addresses(&user.id).await.unwrap();
    assert_eq!(saved.len(), 1);
    assert!(saved[0].is_default);
    assert_eq!(saved[0].address, address("3 Adeola Odeku"));
}

#[tokio::test]
async fn test_email_change_is_all_or_nothing() {
    let ctx = TestContext::new();
    let user = ctx.register("Ada", "ada@example.com").await;
    let profiles = ctx.state.profile();

    // Mirror write fails: auth email is restored.
    ctx.memory.documents.inject_failure(Operation::Write, "users/");
    let err = profiles.change_email("ada.obi@example.com").await.unwrap_err();
    assert!(matches!(err, AppError::Remote(_)));
    assert_eq!(ctx.state.current_user().unwrap().email, user.email);
    ctx.memory.documents.clear_failures();

    // Provider refuses: nothing changes.
    ctx.register("Chidi", "chidi@example.com").await;
    ctx.sign_in("ada@example.com").await;
    let err = profiles.change_email("chidi@example.com").await.unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::EmailAlreadyInUse)));
    let profile = profiles.load_profile(&user).await.unwrap();
    assert_eq!(profile.email.unwrap().as_str(), "ada@example.com");

    // Both succeed: sign-in works with the new email.
    profiles.change_email("ada.obi@example.com").await.unwrap();
    let profile = profiles.load_profile(&user).await.unwrap();
    assert_eq!(profile.email.unwrap().as_str(), "ada.obi@example.com");
    ctx.state.auth().sign_out().await.unwrap();
    ctx.sign_in("ada.obi@example.com").await;
}

#[tokio::test]
async fn test_password_change() {
    let ctx = TestContext::new();
    ctx.register("Ada", "ada@example.com").await;
    let profiles = ctx.state.profile();
    let new_password = SecretString::from("pounded-yam");

    let err = profiles
        .change_password(&new_password, &SecretString::from("pounded-yams"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::PasswordMismatch)));

    profiles
        .change_password(&new_password, &new_password)
        .await
        .unwrap();
    ctx.state.auth().sign_out().await.unwrap();

    let err = ctx
        .state
        .auth()
        .sign_in("ada@example.com", &SecretString::from(PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::WrongPassword));
    ctx.state
        .auth()
        .sign_in("ada@example.com", &new_password)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_credential_changes_need_a_session() {
    let ctx = TestContext::new();
    let err = ctx
        .state
        .profile()
        .change_email("ada@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AuthRequired));
}

#[tokio::test]
async fn test_avatar_reupload_replaces_url() {
    let ctx = TestContext::new();
    let user = ctx.register("Ada", "ada@example.com").await;
    let profiles = ctx.state.profile();

    let first = profiles
        .upload_avatar(&user.id, vec![0x89, 0x50], "image/png")
        .await
        .unwrap();
    let second = profiles
        .upload_avatar(&user.id, vec![0xff, 0xd8], "image/jpeg")
        .await
        .unwrap();
    assert_ne!(first, second);

    let profile = profiles.load_profile(&user).await.unwrap();
    assert_eq!(profile.avatar_url, Some(second));
}

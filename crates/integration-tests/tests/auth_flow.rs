//! Registration and sign-in over the in-memory platform.

#![allow(clippy::unwrap_used)]

use secrecy::SecretString;

use bukka_integration_tests::{PASSWORD, TestContext};
use bukka_storefront::services::auth::AuthError;

#[tokio::test]
async fn test_register_then_sign_in() {
    let ctx = TestContext::new();
    let user = ctx.register("Ada Obi", "ada@example.com").await;
    assert_eq!(ctx.state.current_user_id(), Some(user.id.clone()));
    assert_eq!(ctx.state.auth().display_name(Some(&user)).await, "Ada Obi");

    ctx.state.auth().sign_out().await.unwrap();
    assert!(ctx.state.current_user().is_none());

    let again = ctx.sign_in("ada@example.com").await;
    assert_eq!(again.id, user.id);
}

#[tokio::test]
async fn test_duplicate_registration() {
    let ctx = TestContext::new();
    ctx.register("Ada", "ada@example.com").await;

    let password = SecretString::from(PASSWORD);
    let err = ctx
        .state
        .auth()
        .register("Ada", "ada@example.com", &password, &password)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::EmailAlreadyInUse));
    assert_eq!(
        err.user_message(),
        "An account with this email already exists. Please sign in."
    );
}

#[tokio::test]
async fn test_registration_validation() {
    let ctx = TestContext::new();
    let auth = ctx.state.auth();

    let short = SecretString::from("abc123");
    let err = auth
        .register("Ada", "ada@example.com", &short, &short)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::WeakPassword(_)));

    let password = SecretString::from(PASSWORD);
    let err = auth
        .register("Ada", "not-an-email", &password, &password)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidEmail));
    assert!(ctx.state.current_user().is_none());
}

#[tokio::test]
async fn test_sign_in_errors_are_translated() {
    let ctx = TestContext::new();
    ctx.register("Ada", "ada@example.com").await;
    ctx.state.auth().sign_out().await.unwrap();
    let auth = ctx.state.auth();

    let err = auth
        .sign_in("nobody@example.com", &SecretString::from(PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(
        err.user_message(),
        "No account found with this email. Please sign up first."
    );

    let err = auth
        .sign_in("ada@example.com", &SecretString::from("wrong-password"))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Incorrect password. Please try again.");

    ctx.memory.auth.reject_next("TOO_MANY_ATTEMPTS_TRY_LATER");
    let err = auth
        .sign_in("ada@example.com", &SecretString::from(PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::TooManyAttempts));
}

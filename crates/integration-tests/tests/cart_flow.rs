//! Cart behaviour over the in-memory platform.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::task::JoinSet;

use bukka_core::{ItemId, UserId};
use bukka_integration_tests::TestContext;
use bukka_storefront::cart::{CheckoutOutcome, CheckoutState, LineChange, LineRequest, LiveCart};
use bukka_storefront::error::AppError;
use bukka_storefront::models::{CartLine, compute_total};
use bukka_storefront::platform::CollectionPath;
use bukka_storefront::platform::memory::Operation;

async fn next_lines(live: &mut LiveCart) -> Vec<CartLine> {
    tokio::time::timeout(Duration::from_secs(2), live.next())
        .await
        .unwrap()
        .unwrap()
}

fn ids(lines: &[CartLine]) -> Vec<&str> {
    lines.iter().map(|l| l.item_id.as_str()).collect()
}

// =============================================================================
// Add / merge
// =============================================================================

#[tokio::test]
async fn test_concurrent_adds_make_one_line() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    let jollof = ctx.item("jollof-rice").await;

    let mut adds = JoinSet::new();
    for _ in 0..5 {
        let state = ctx.state.clone();
        let item = jollof.clone();
        let user = user.id.clone();
        adds.spawn(async move {
            state
                .cart()
                .add_or_merge_line(Some(&user), LineRequest::listed(&item, "Regular"))
                .await
        });
    }
    let mut changes = Vec::new();
    while let Some(result) = adds.join_next().await {
        changes.push(result.unwrap().unwrap());
    }

    assert_eq!(changes.iter().filter(|c| **c == LineChange::Added).count(), 1);
    let lines = ctx.state.cart().lines(&user.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 5);
}

#[tokio::test]
async fn test_add_without_variant_or_price_creates_nothing() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    let suya = ctx.item("suya").await;

    let err = ctx
        .state
        .cart()
        .add_or_merge_line(
            Some(&user.id),
            LineRequest {
                item: &suya,
                variant: None,
                unit_price: None,
                instructions: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(ctx.state.cart().lines(&user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_add_keeps_chosen_price_and_instructions() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    let jollof = ctx.item("jollof-rice").await;

    ctx.state
        .cart()
        .add_or_merge_line(
            Some(&user.id),
            LineRequest {
                item: &jollof,
                variant: Some("Large"),
                unit_price: Some(Decimal::from(3000)),
                instructions: Some("  extra plantain "),
            },
        )
        .await
        .unwrap();

    let lines = ctx.state.cart().lines(&user.id).await.unwrap();
    assert_eq!(lines[0].unit_price, Decimal::from(3000));
    assert_eq!(lines[0].variant, "Large");
    assert_eq!(lines[0].instructions.as_deref(), Some("extra plantain"));
    assert_eq!(lines[0].name, "Jollof Rice");
}

#[tokio::test]
async fn test_failed_write_surfaces_as_remote_error() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    ctx.memory.documents.inject_failure(Operation::Write, "users/");

    let err = ctx
        .state
        .cart()
        .add_or_merge_line(
            Some(&user.id),
            LineRequest::listed(&ctx.item("zobo").await, "Chilled"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Remote(_)));
}

// =============================================================================
// Remove and totals
// =============================================================================

#[tokio::test]
async fn test_remove_twice_is_idempotent() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    let cart = ctx.state.cart();
    let zobo = ctx.item("zobo").await;

    cart.add_or_merge_line(Some(&user.id), LineRequest::listed(&zobo, "Chilled"))
        .await
        .unwrap();
    cart.remove_line(Some(&user.id), &zobo.id).await.unwrap();
    cart.remove_line(Some(&user.id), &zobo.id).await.unwrap();

    assert!(cart.lines(&user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_requires_user() {
    let ctx = TestContext::new();
    let err = ctx
        .state
        .cart()
        .remove_line(None, &ItemId::parse("zobo").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AuthRequired));
}

#[tokio::test]
async fn test_totals() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    let cart = ctx.state.cart();
    let jollof = ctx.item("jollof-rice").await;
    let puff = ctx.item("puff-puff").await;

    assert_eq!(compute_total(&[]), Decimal::ZERO);

    let at_1000 = LineRequest {
        unit_price: Some(Decimal::from(1000)),
        ..LineRequest::listed(&jollof, "Regular")
    };
    cart.add_or_merge_line(Some(&user.id), at_1000).await.unwrap();
    cart.add_or_merge_line(Some(&user.id), at_1000).await.unwrap();
    cart.add_or_merge_line(Some(&user.id), LineRequest::listed(&puff, "Regular"))
        .await
        .unwrap();

    let lines = cart.lines(&user.id).await.unwrap();
    assert_eq!(compute_total(&lines), Decimal::from(2500));

    let summary = cart.summary(&user.id).await.unwrap();
    assert_eq!(summary.items, 3);
    assert_eq!(summary.total.display(), "₦2,500.00");
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_empties_live_cart_and_marks_checked_out() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    let cart = ctx.state.cart();

    let mut live = cart.live_cart();
    assert!(next_lines(&mut live).await.is_empty());

    for id in ["jollof-rice", "suya"] {
        cart.add_or_merge_line(Some(&user.id), LineRequest::listed(&ctx.item(id).await, "Regular"))
            .await
            .unwrap();
    }
    let mut lines = next_lines(&mut live).await;
    while lines.len() < 2 {
        lines = next_lines(&mut live).await;
    }

    let view = cart.checkout_context(&user.id);
    let outcome = cart.checkout(Some(&user.id), &view).await.unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Completed(ref r) if r.cleared == 2));
    assert_eq!(view.state(), CheckoutState::CheckedOut);

    let mut lines = next_lines(&mut live).await;
    while !lines.is_empty() {
        lines = next_lines(&mut live).await;
    }

    view.close();
    assert_eq!(view.state(), CheckoutState::Idle);
}

#[tokio::test]
async fn test_checkout_requires_user() {
    let ctx = TestContext::new();
    let view = ctx
        .state
        .cart()
        .checkout_context(&UserId::parse("guest").unwrap());
    let err = ctx.state.cart().checkout(None, &view).await.unwrap_err();
    assert!(matches!(err, AppError::AuthRequired));
}

#[tokio::test]
async fn test_other_users_cart_changes_keep_checkout_state() {
    let ctx = TestContext::with_menu().await;
    let ada = ctx.register("Ada", "ada@example.com").await;
    let chidi = ctx.register("Chidi", "chidi@example.com").await;
    let cart = ctx.state.cart();
    let suya = ctx.item("suya").await;

    cart.add_or_merge_line(Some(&ada.id), LineRequest::listed(&suya, "Regular"))
        .await
        .unwrap();
    let ada_view = cart.checkout_context(&ada.id);
    cart.checkout(Some(&ada.id), &ada_view).await.unwrap();
    assert_eq!(ada_view.state(), CheckoutState::CheckedOut);

    cart.add_or_merge_line(Some(&chidi.id), LineRequest::listed(&suya, "Regular"))
        .await
        .unwrap();
    cart.remove_line(Some(&chidi.id), &suya.id).await.unwrap();
    assert_eq!(ada_view.state(), CheckoutState::CheckedOut);

    cart.add_or_merge_line(Some(&ada.id), LineRequest::listed(&suya, "Regular"))
        .await
        .unwrap();
    assert_eq!(ada_view.state(), CheckoutState::Idle);
}

#[tokio::test]
async fn test_partial_checkout_keeps_surviving_lines() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    let cart = ctx.state.cart();
    for id in ["egusi-soup", "puff-puff", "zobo"] {
        cart.add_or_merge_line(Some(&user.id), LineRequest::listed(&ctx.item(id).await, "Regular"))
            .await
            .unwrap();
    }
    ctx.memory.documents.inject_failure(
        Operation::Delete,
        &format!("users/{}/cart/zobo", user.id),
    );

    let view = cart.checkout_context(&user.id);
    let err = cart.checkout(Some(&user.id), &view).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::PartialFailure { attempted: 3, ref failed } if failed == &["zobo".to_string()]
    ));
    assert_eq!(view.state(), CheckoutState::Idle);
    assert_eq!(ids(&cart.lines(&user.id).await.unwrap()), vec!["zobo"]);

    // Retrying after the fault clears the rest.
    ctx.memory.documents.clear_failures();
    cart.checkout(Some(&user.id), &view).await.unwrap();
    assert!(cart.lines(&user.id).await.unwrap().is_empty());
}

// =============================================================================
// Live cart and auth changes
// =============================================================================

#[tokio::test]
async fn test_live_cart_follows_auth_user() {
    let ctx = TestContext::with_menu().await;
    let ada = ctx.register("Ada", "ada@example.com").await;
    let cart = ctx.state.cart();

    let mut live = cart.live_cart();
    assert!(next_lines(&mut live).await.is_empty());

    cart.add_or_merge_line(Some(&ada.id), LineRequest::listed(&ctx.item("jollof-rice").await, "Regular"))
        .await
        .unwrap();
    assert_eq!(ids(&next_lines(&mut live).await), vec!["jollof-rice"]);

    ctx.state.auth().sign_out().await.unwrap();
    assert!(next_lines(&mut live).await.is_empty());

    let chidi = ctx.register("Chidi", "chidi@example.com").await;
    assert!(next_lines(&mut live).await.is_empty());

    cart.add_or_merge_line(Some(&chidi.id), LineRequest::listed(&ctx.item("zobo").await, "Chilled"))
        .await
        .unwrap();
    assert_eq!(ids(&next_lines(&mut live).await), vec!["zobo"]);

    // Ada's cart changing is not Chidi's business.
    cart.remove_line(Some(&ada.id), &ItemId::parse("jollof-rice").unwrap())
        .await
        .unwrap();
    assert!(
        tokio::time::timeout(Duration::from_millis(100), live.next())
            .await
            .is_err()
    );

    ctx.state.auth().sign_out().await.unwrap();
    assert!(next_lines(&mut live).await.is_empty());
    ctx.sign_in("ada@example.com").await;
    assert!(next_lines(&mut live).await.is_empty());
}

#[tokio::test]
async fn test_user_scoped_feed_stops_on_cancel() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    let mut feed = ctx.state.cart().get_live_cart(&user.id);
    assert!(feed.next().await.unwrap().unwrap().is_empty());
    feed.cancel();

    // Another user's feed is independent.
    let other = UserId::parse("someone-else").unwrap();
    let mut feed = ctx.state.cart().get_live_cart(&other);
    assert!(feed.next().await.unwrap().unwrap().is_empty());
}

#[tokio::test]
async fn test_stored_negative_price_line_is_ignored() {
    let ctx = TestContext::with_menu().await;
    let user = ctx.register("Ada", "ada@example.com").await;
    let cart = ctx.state.cart();
    cart.add_or_merge_line(Some(&user.id), LineRequest::listed(&ctx.item("zobo").await, "Chilled"))
        .await
        .unwrap();
    ctx.memory.documents.seed(
        &CollectionPath::root("users")
            .doc(user.id.as_str())
            .collection("cart")
            .doc("suya"),
        serde_json::json!({"name": "Suya", "price": -1500, "type": "Regular", "quantity": 1})
            .as_object()
            .cloned()
            .unwrap(),
    );

    let lines = cart.lines(&user.id).await.unwrap();
    assert_eq!(ids(&lines), vec!["zobo"]);
    let summary = cart.summary(&user.id).await.unwrap();
    assert_eq!(summary.total.amount, Decimal::from(800));
}

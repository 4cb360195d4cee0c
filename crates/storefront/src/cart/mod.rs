//! Cart manager.
//!
//! Each user's cart lives at `users/{uid}/cart/{itemId}`, one document per
//! menu item. Adding an item that is already in the cart increments its
//! quantity; nothing else about the line changes.
//!
//! # Checkout
//!
//! Checkout deletes every line concurrently. There is no transaction: if some
//! deletes fail, the lines that failed stay in the cart and the caller gets
//! [`AppError::PartialFailure`] naming them.

mod checkout;
mod live;

pub use checkout::{CheckoutContext, CheckoutOutcome, CheckoutReceipt, CheckoutState};
pub use live::{CartFeed, LiveCart};

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use bukka_core::{CurrencyCode, ItemId, Price, UserId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CartLine, CartSummary, FoodItem, compute_total};
use crate::platform::{AuthProvider, CollectionPath, DocumentStore, PlatformError, Query};
use crate::services::auth::USERS;
use checkout::ContextRegistry;

/// Collection holding one user's cart lines.
pub(crate) fn cart_collection(user: &UserId) -> CollectionPath {
    CollectionPath::root(USERS).doc(user.as_str()).collection("cart")
}

/// What the user picked when adding an item.
#[derive(Debug, Clone, Copy)]
pub struct LineRequest<'a> {
    /// Snapshot of the menu item being added.
    pub item: &'a FoodItem,
    /// Variant label; required.
    pub variant: Option<&'a str>,
    /// Unit price for the chosen variant; required.
    pub unit_price: Option<Decimal>,
    pub instructions: Option<&'a str>,
}

impl<'a> LineRequest<'a> {
    /// Request for `item` at its listed price.
    #[must_use]
    pub const fn listed(item: &'a FoodItem, variant: &'a str) -> Self {
        Self {
            item,
            variant: Some(variant),
            unit_price: Some(item.price.amount),
            instructions: None,
        }
    }

    fn validate(&self) -> Result<(&'a str, Decimal)> {
        let variant = self
            .variant
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Validation("Please choose an option.".to_string()))?;
        let price = self
            .unit_price
            .ok_or_else(|| AppError::Validation("Price is missing for this item.".to_string()))?;
        if price.is_sign_negative() && !price.is_zero() {
            return Err(AppError::Validation(
                "Price cannot be negative.".to_string(),
            ));
        }
        if !self.item.available {
            return Err(AppError::Validation(
                "This item is currently unavailable.".to_string(),
            ));
        }
        Ok((variant, price))
    }
}

/// How an add changed the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    /// A new line with quantity 1.
    Added,
    /// An existing line's quantity went up by one.
    Merged,
}

/// Owns the signed-in user's cart.
#[derive(Clone)]
pub struct CartManager {
    inner: Arc<CartManagerInner>,
}

struct CartManagerInner {
    documents: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
    currency: CurrencyCode,
    contexts: ContextRegistry,
}

/// Capture a store failure and convert it.
fn remote(e: PlatformError) -> AppError {
    AppError::from(e).report()
}

impl CartManager {
    #[must_use]
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            inner: Arc::new(CartManagerInner {
                documents,
                auth,
                currency,
                contexts: ContextRegistry::default(),
            }),
        }
    }

    /// Open a checkout context for a view of `user`'s cart.
    ///
    /// Any later mutation of that cart through this manager resets it to `Idle`.
    #[must_use]
    pub fn checkout_context(&self, user: &UserId) -> CheckoutContext {
        let context = CheckoutContext::new();
        self.inner.contexts.register(user, &context);
        context
    }

    /// Add an item, or bump its quantity if it is already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AuthRequired` without a user.
    /// Returns `AppError::Validation` if the variant or price is missing, the
    /// price is negative or the item is unavailable. Nothing is written then.
    /// Returns `AppError::Remote` if the store write fails.
    #[instrument(skip(self, request), fields(item_id = %request.item.id))]
    pub async fn add_or_merge_line(
        &self,
        user: Option<&UserId>,
        request: LineRequest<'_>,
    ) -> Result<LineChange> {
        let user = user.ok_or(AppError::AuthRequired)?;
        let (variant, unit_price) = request.validate()?;

        let item = request.item;
        let line = CartLine {
            item_id: item.id.clone(),
            name: item.name.clone(),
            image_url: item.image_url.clone(),
            unit_price,
            variant: variant.to_owned(),
            instructions: request
                .instructions
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            quantity: 1,
        };
        let path = cart_collection(user).doc(item.id.as_str());
        let documents = &self.inner.documents;

        let change = match documents.create(&path, line.to_fields()).await {
            Ok(()) => LineChange::Added,
            Err(PlatformError::AlreadyExists(_)) => {
                match documents.increment(&path, "quantity", 1).await {
                    Ok(()) => LineChange::Merged,
                    // Removed between the two calls.
                    Err(e) if e.is_not_found() => {
                        documents
                            .create(&path, line.to_fields())
                            .await
                            .map_err(remote)?;
                        LineChange::Added
                    }
                    Err(e) => return Err(remote(e)),
                }
            }
            Err(e) => return Err(remote(e)),
        };

        self.inner.contexts.reset(user);
        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[("item_id", item.id.as_str()), ("variant", variant)]),
        );
        info!(user_id = %user, change = ?change, "Cart line updated");
        Ok(change)
    }

    /// Remove an item's line. Removing a missing line succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AuthRequired` without a user, or the store error.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_line(&self, user: Option<&UserId>, item_id: &ItemId) -> Result<()> {
        let user = user.ok_or(AppError::AuthRequired)?;
        self.inner
            .documents
            .delete(&cart_collection(user).doc(item_id.as_str()))
            .await
            .map_err(remote)?;

        self.inner.contexts.reset(user);
        add_breadcrumb("cart", "Removed item", Some(&[("item_id", item_id.as_str())]));
        Ok(())
    }

    /// Current lines of a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Remote` if the cart can't be read.
    pub async fn lines(&self, user: &UserId) -> Result<Vec<CartLine>> {
        let docs = self
            .inner
            .documents
            .query(&Query::collection(cart_collection(user)))
            .await?;
        Ok(live::decode_lines(&docs))
    }

    /// Line count, item count and total of a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Remote` if the cart can't be read.
    pub async fn summary(&self, user: &UserId) -> Result<CartSummary> {
        let lines = self.lines(user).await?;
        Ok(CartSummary::of(&lines, self.inner.currency))
    }

    /// Live line sets for one user, until the feed is dropped.
    #[must_use]
    pub fn get_live_cart(&self, user: &UserId) -> CartFeed {
        CartFeed::new(self.inner.documents.subscribe(&cart_collection(user)))
    }

    /// Live line sets for whoever is signed in.
    ///
    /// Follows the auth state: empty while signed out, re-scoped when the
    /// user changes.
    #[must_use]
    pub fn live_cart(&self) -> LiveCart {
        LiveCart::spawn(
            Arc::clone(&self.inner.documents),
            self.inner.auth.auth_state(),
        )
    }

    /// Clear the cart.
    ///
    /// Deletes every line concurrently and marks the context `CheckedOut`.
    /// Checking out an already checked-out context does nothing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AuthRequired` without a user.
    /// Returns `AppError::Validation` if the cart is empty.
    /// Returns `AppError::PartialFailure` if some deletes failed; those lines
    /// stay in the cart and the context stays `Idle`.
    #[instrument(skip(self, context))]
    pub async fn checkout(
        &self,
        user: Option<&UserId>,
        context: &CheckoutContext,
    ) -> Result<CheckoutOutcome> {
        let user = user.ok_or(AppError::AuthRequired)?;
        if context.state() == CheckoutState::CheckedOut {
            return Ok(CheckoutOutcome::AlreadyCheckedOut);
        }

        let collection = cart_collection(user);
        let docs = self
            .inner
            .documents
            .query(&Query::collection(collection.clone()))
            .await
            .map_err(remote)?;
        if docs.is_empty() {
            return Err(AppError::Validation("Your cart is empty.".to_string()));
        }
        let total = compute_total(&live::decode_lines(&docs));

        let deletes = docs.iter().map(|doc| {
            let path = collection.doc(&doc.id);
            let documents = Arc::clone(&self.inner.documents);
            async move { (path.id().to_owned(), documents.delete(&path).await) }
        });
        let results = join_all(deletes).await;

        let attempted = results.len();
        let failed: Vec<String> = results
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    warn!(user_id = %user, item_id = %id, error = %e, "Failed to remove cart line");
                    Some(id)
                }
            })
            .collect();

        if !failed.is_empty() {
            add_breadcrumb("cart", "Checkout partially failed", None);
            return Err(AppError::PartialFailure { attempted, failed }.report());
        }

        context.mark_checked_out();
        add_breadcrumb("cart", "Checked out", None);
        info!(user_id = %user, cleared = attempted, "Checkout complete");
        Ok(CheckoutOutcome::Completed(CheckoutReceipt {
            cleared: attempted,
            total: Price::new(total, self.inner.currency),
        }))
    }
}

impl std::fmt::Debug for CartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartManager")
            .field("currency", &self.inner.currency)
            .finish_non_exhaustive()
    }
}

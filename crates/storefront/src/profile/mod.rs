//! Session and profile store.
//!
//! The profile is the `users/{uid}` document written at registration. It is
//! read on load and written one section at a time with field-path scoped
//! merges, so saving one section never replaces another.
//!
//! Credential changes go through the auth provider first. The mirrored email
//! on the profile only changes once the provider has accepted the new one,
//! and the provider change is rolled back if the mirror can't be written.

mod sections;
mod snapshot;

pub use sections::section_fields;
pub use snapshot::{read_profile, read_saved_address};

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use bukka_core::{Email, OrderId, UserId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{
    DEFAULT_ADDRESS_LABEL, DeliveryAddress, OrderSummary, ProfileSection, ProfileSnapshot,
    SavedAddress,
};
use crate::platform::document::{set_path, timestamp_now};
use crate::platform::{
    AuthProvider, AuthUser, CollectionPath, Direction, DocumentPath, DocumentStore, FieldMask,
    Fields, ObjectStorage, PlatformError, Query,
};
use crate::services::auth::{AuthError, USERS, validate_password};

/// Orders collection.
pub const ORDERS: &str = "orders";

/// Saved addresses root collection.
pub const USER_ADDRESSES: &str = "userAddresses";

/// Orders shown in the history.
const ORDER_HISTORY_LIMIT: usize = 10;

fn profile_path(user: &UserId) -> DocumentPath {
    CollectionPath::root(USERS).doc(user.as_str())
}

fn addresses(user: &UserId) -> CollectionPath {
    CollectionPath::root(USER_ADDRESSES)
        .doc(user.as_str())
        .collection("addresses")
}

fn remote(e: PlatformError) -> AppError {
    AppError::from(e).report()
}

/// Reads and partially updates user profiles.
#[derive(Clone)]
pub struct ProfileStore {
    inner: Arc<ProfileStoreInner>,
}

struct ProfileStoreInner {
    documents: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
    storage: Arc<dyn ObjectStorage>,
}

impl ProfileStore {
    #[must_use]
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            inner: Arc::new(ProfileStoreInner {
                documents,
                auth,
                storage,
            }),
        }
    }

    async fn merge(&self, path: &DocumentPath, fields: Fields) -> Result<()> {
        let mask = FieldMask::leaves(&fields);
        self.inner
            .documents
            .merge(path, fields, &mask)
            .await
            .map_err(remote)
    }

    /// Load a user's profile. A user without a profile document gets defaults
    /// and the provider's email.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Remote` if the document can't be read.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn load_profile(&self, user: &AuthUser) -> Result<ProfileSnapshot> {
        let doc = self
            .inner
            .documents
            .get(&profile_path(&user.id))
            .await
            .map_err(remote)?;
        Ok(read_profile(
            doc.as_ref().map(|d| &d.fields),
            Some(user.email.clone()),
        ))
    }

    /// Save one section, leaving every other field of the profile untouched.
    ///
    /// Saving the delivery section also updates the "Default" saved address,
    /// creating it the first time.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the section content is rejected.
    /// Returns `AppError::Remote` if a write fails.
    #[instrument(skip(self, section), fields(section = section.name()))]
    pub async fn save_section(&self, user: &UserId, section: &ProfileSection) -> Result<()> {
        let fields = section_fields(section)?;
        self.merge(&profile_path(user), fields).await?;

        if let ProfileSection::Delivery(address) = section {
            self.sync_default_address(user, address).await?;
        }

        info!(user_id = %user, "Profile section saved");
        Ok(())
    }

    async fn sync_default_address(&self, user: &UserId, address: &DeliveryAddress) -> Result<()> {
        let collection = addresses(user);
        let existing = self
            .inner
            .documents
            .query(
                &Query::collection(collection.clone())
                    .where_eq("label", DEFAULT_ADDRESS_LABEL)
                    .limit(1),
            )
            .await
            .map_err(remote)?;

        let mut fields = Fields::new();
        sections::address_fields(&mut fields, "", address);
        fields.insert("label".to_owned(), Value::String(DEFAULT_ADDRESS_LABEL.to_owned()));
        fields.insert("isDefault".to_owned(), Value::Bool(true));
        fields.insert("updatedAt".to_owned(), timestamp_now());

        match existing.first() {
            Some(doc) => self.merge(&collection.doc(&doc.id), fields).await,
            None => {
                fields.insert("createdAt".to_owned(), timestamp_now());
                self.inner
                    .documents
                    .add(&collection, fields)
                    .await
                    .map(|_| ())
                    .map_err(remote)
            }
        }
    }

    /// Upload a new avatar and point the profile at it.
    ///
    /// There is one avatar per user; uploading replaces the previous one.
    /// If the upload fails the profile keeps its previous avatar.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` for empty or non-image uploads.
    /// Returns `AppError::Storage` if the upload fails.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_avatar(
        &self,
        user: &UserId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Please choose an image.".to_string()));
        }
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation(
                "Profile pictures must be images.".to_string(),
            ));
        }

        let key = format!("avatars/{user}");
        let storage = &self.inner.storage;
        storage
            .upload(&key, bytes, content_type)
            .await
            .map_err(|e| AppError::from(e).report())?;
        let url = storage
            .download_url(&key)
            .await
            .map_err(|e| AppError::from(e).report())?
            .to_string();

        let mut fields = Fields::new();
        fields.insert("avatarUrl".to_owned(), Value::String(url.clone()));
        fields.insert("updatedAt".to_owned(), timestamp_now());
        self.merge(&profile_path(user), fields).await?;

        add_breadcrumb("profile", "Avatar uploaded", None);
        Ok(url)
    }

    fn signed_in(&self) -> Result<AuthUser> {
        self.inner.auth.current_user().ok_or(AppError::AuthRequired)
    }

    /// Change the signed-in user's email and its mirror on the profile.
    ///
    /// Either both change or neither does.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AuthRequired` when nobody is signed in.
    /// Returns `AppError::Auth` if the provider refuses the change.
    /// Returns `AppError::Remote` if the mirror can't be written; the provider
    /// change has been rolled back by then.
    #[instrument(skip(self, new_email))]
    pub async fn change_email(&self, new_email: &str) -> Result<AuthUser> {
        let before = self.signed_in()?;
        let email = Email::parse(new_email).map_err(AuthError::from)?;
        if email == before.email {
            return Ok(before);
        }

        let updated = self.inner.auth.update_email(&email).await?;

        let mut fields = Fields::new();
        fields.insert("email".to_owned(), Value::String(email.as_str().to_owned()));
        set_path(
            &mut fields,
            "personal.email",
            Value::String(email.as_str().to_owned()),
        );
        fields.insert("updatedAt".to_owned(), timestamp_now());

        if let Err(e) = self.merge(&profile_path(&before.id), fields).await {
            warn!(user_id = %before.id, "Rolling back email change");
            if let Err(rollback) = self.inner.auth.update_email(&before.email).await {
                error!(
                    user_id = %before.id,
                    error = %rollback,
                    "Failed to roll back email change"
                );
            }
            return Err(e);
        }

        info!(user_id = %updated.id, "Email changed");
        Ok(updated)
    }

    /// Change the signed-in user's password.
    ///
    /// # Errors
    ///
    /// Returns `AppError::AuthRequired` when nobody is signed in.
    /// Returns `AppError::Auth` if the passwords differ, the new one is too
    /// short, or the provider refuses the change.
    #[instrument(skip(self, password, confirm))]
    pub async fn change_password(
        &self,
        password: &SecretString,
        confirm: &SecretString,
    ) -> Result<()> {
        let user = self.signed_in()?;
        if password.expose_secret() != confirm.expose_secret() {
            return Err(AuthError::PasswordMismatch.into());
        }
        validate_password(password.expose_secret())?;

        self.inner.auth.update_password(password).await?;
        info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    async fn recent_orders(&self, user: &UserId, limit: usize) -> Result<Vec<OrderSummary>> {
        let docs = self
            .inner
            .documents
            .query(
                &Query::collection(CollectionPath::root(ORDERS))
                    .where_eq("uid", user.as_str())
                    .order_by("createdAt", Direction::Descending)
                    .limit(limit),
            )
            .await
            .map_err(remote)?;

        Ok(docs
            .iter()
            .filter_map(|doc| match OrderSummary::from_document(doc) {
                Ok(order) => Some(order),
                Err(e) => {
                    warn!(order_id = %doc.id, error = %e, "Skipping malformed order");
                    None
                }
            })
            .collect())
    }

    /// The user's ten most recent orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Remote` if the orders can't be read.
    #[instrument(skip(self))]
    pub async fn order_history(&self, user: &UserId) -> Result<Vec<OrderSummary>> {
        self.recent_orders(user, ORDER_HISTORY_LIMIT).await
    }

    /// The user's saved addresses.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Remote` if the addresses can't be read.
    #[instrument(skip(self))]
    pub async fn saved_addresses(&self, user: &UserId) -> Result<Vec<SavedAddress>> {
        let docs = self
            .inner
            .documents
            .query(&Query::collection(addresses(user)))
            .await
            .map_err(remote)?;

        Ok(docs
            .iter()
            .filter_map(|doc| read_saved_address(doc).ok())
            .collect())
    }

    /// Rate the last order with 1 to 5 stars.
    ///
    /// The rating is kept on the profile and, when the user has orders,
    /// attached to the most recent one. Returns the rated order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if `stars` is outside 1-5.
    /// Returns `AppError::Remote` if a write fails.
    #[instrument(skip(self))]
    pub async fn submit_rating(&self, user: &UserId, stars: u8) -> Result<Option<OrderId>> {
        if !(1..=5).contains(&stars) {
            return Err(AppError::Validation(
                "Please choose between 1 and 5 stars.".to_string(),
            ));
        }

        let mut fields = Fields::new();
        fields.insert("lastOrderRating".to_owned(), Value::from(stars));
        fields.insert("updatedAt".to_owned(), timestamp_now());
        self.merge(&profile_path(user), fields).await?;

        let Some(latest) = self.recent_orders(user, 1).await?.into_iter().next() else {
            return Ok(None);
        };
        let mut review = Fields::new();
        set_path(&mut review, "review.rating", Value::from(stars));
        set_path(&mut review, "review.submittedAt", timestamp_now());
        self.merge(
            &CollectionPath::root(ORDERS).doc(latest.id.as_str()),
            review,
        )
        .await?;

        info!(user_id = %user, order_id = %latest.id, stars, "Order rated");
        Ok(Some(latest.id))
    }
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use bukka_core::PaymentMethod;

    use super::*;
    use crate::models::{CardDetails, PaymentPreferences, PersonalInfo};
    use crate::platform::Platform;
    use crate::platform::memory::{MemoryPlatform, Operation};

    async fn store() -> (ProfileStore, MemoryPlatform, AuthUser) {
        let (platform, memory) = Platform::memory();
        let user = platform
            .auth
            .sign_up(
                &Email::parse("ada@example.com").unwrap(),
                &SecretString::from("jollof-rice"),
            )
            .await
            .unwrap();
        let store = ProfileStore::new(platform.documents, platform.auth, platform.storage);
        (store, memory, user)
    }

    fn lagos() -> DeliveryAddress {
        DeliveryAddress {
            street: "12 Allen Avenue".to_string(),
            city: "Ikeja".to_string(),
            state: "Lagos".to_string(),
            postal_code: "100271".to_string(),
            ..DeliveryAddress::default()
        }
    }

    #[tokio::test]
    async fn test_load_missing_profile_gives_defaults() {
        let (store, _, user) = store().await;
        let profile = store.load_profile(&user).await.unwrap();
        assert_eq!(profile, ProfileSnapshot::empty(Some(user.email)));
    }

    #[tokio::test]
    async fn test_delivery_save_keeps_payment() {
        let (store, _, user) = store().await;
        let payment = PaymentPreferences {
            method: PaymentMethod::Card,
            billing_address: Some("12 Allen Avenue".to_string()),
            card: Some(CardDetails {
                last4: "4242".to_string(),
                brand: "Visa".to_string(),
                expiry: "04/27".to_string(),
            }),
            mobile: None,
        };
        store
            .save_section(&user.id, &ProfileSection::Payment(payment.clone()))
            .await
            .unwrap();
        store
            .save_section(&user.id, &ProfileSection::Delivery(lagos()))
            .await
            .unwrap();

        let profile = store.load_profile(&user).await.unwrap();
        assert_eq!(profile.payment, payment);
        assert_eq!(profile.delivery, lagos());
    }

    #[tokio::test]
    async fn test_delivery_save_upserts_default_address() {
        let (store, _, user) = store().await;
        store
            .save_section(&user.id, &ProfileSection::Delivery(lagos()))
            .await
            .unwrap();
        let mut moved = lagos();
        moved.street = "3 Adeola Odeku".to_string();
        store
            .save_section(&user.id, &ProfileSection::Delivery(moved))
            .await
            .unwrap();

        let saved = store.saved_addresses(&user.id).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].label, "Default");
        assert!(saved[0].is_default);
        assert_eq!(saved[0].address.street, "3 Adeola Odeku");
    }

    #[tokio::test]
    async fn test_failed_save_propagates() {
        let (store, memory, user) = store().await;
        memory.documents.inject_failure(Operation::Write, USERS);
        let err = store
            .save_section(&user.id, &ProfileSection::Personal(PersonalInfo::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Remote(_)));
    }

    #[tokio::test]
    async fn test_avatar_upload_failure_keeps_previous() {
        let (store, memory, user) = store().await;
        let first = store
            .upload_avatar(&user.id, vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        memory.storage.fail_uploads(true);
        let err = store
            .upload_avatar(&user.id, vec![4, 5, 6], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let profile = store.load_profile(&user).await.unwrap();
        assert_eq!(profile.avatar_url.as_deref(), Some(first.as_str()));
        let (bytes, _) = memory.storage.object(&format!("avatars/{}", user.id)).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_avatar_rejects_non_images() {
        let (store, _, user) = store().await;
        let err = store
            .upload_avatar(&user.id, b"%PDF".to_vec(), "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_change_email_updates_mirror() {
        let (store, memory, user) = store().await;
        let updated = store.change_email("ada.obi@example.com").await.unwrap();
        assert_eq!(updated.email.as_str(), "ada.obi@example.com");

        let raw = memory.documents.raw(&profile_path(&user.id)).unwrap();
        assert_eq!(raw["email"], json!("ada.obi@example.com"));
        assert_eq!(raw["personal"]["email"], json!("ada.obi@example.com"));
    }

    #[tokio::test]
    async fn test_change_email_rolls_back_when_mirror_fails() {
        let (store, memory, user) = store().await;
        memory.documents.inject_failure(Operation::Write, USERS);

        let err = store.change_email("ada.obi@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::Remote(_)));
        assert_eq!(
            store.inner.auth.current_user().unwrap().email,
            user.email
        );
        assert!(memory.documents.raw(&profile_path(&user.id)).is_none());
    }

    #[tokio::test]
    async fn test_change_email_refused_by_provider() {
        let (store, memory, user) = store().await;
        memory.auth.reject_next("EMAIL_EXISTS");

        let err = store.change_email("taken@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::EmailAlreadyInUse)));
        assert_eq!(store.inner.auth.current_user().unwrap().email, user.email);
    }

    #[tokio::test]
    async fn test_change_password_validation() {
        let (store, _, _) = store().await;
        let err = store
            .change_password(&SecretString::from("short"), &SecretString::from("short"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::WeakPassword(_))));

        store
            .change_password(
                &SecretString::from("pounded-yam"),
                &SecretString::from("pounded-yam"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_order_history_and_rating() {
        let (store, memory, user) = store().await;
        let orders = CollectionPath::root(ORDERS);
        for (id, day) in [("order-a", 1), ("order-b", 3), ("order-c", 2)] {
            memory.documents.seed(
                &orders.doc(id),
                json!({
                    "uid": user.id.as_str(),
                    "items": [{"name": "Jollof Rice", "quantity": 1}],
                    "total": 2500,
                    "createdAt": format!("2025-03-0{day}T12:00:00Z"),
                })
                .as_object()
                .cloned()
                .unwrap(),
            );
        }
        memory.documents.seed(
            &orders.doc("someone-else"),
            json!({"uid": "other", "createdAt": "2025-03-09T12:00:00Z"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let history = store.order_history(&user.id).await.unwrap();
        let ids: Vec<_> = history.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["order-b", "order-c", "order-a"]);

        let rated = store.submit_rating(&user.id, 5).await.unwrap();
        assert_eq!(rated.unwrap().as_str(), "order-b");
        let order = memory.documents.raw(&orders.doc("order-b")).unwrap();
        assert_eq!(order["review"]["rating"], json!(5));
        assert_eq!(store.load_profile(&user).await.unwrap().last_order_rating, 5);

        let err = store.submit_rating(&user.id, 6).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rating_without_orders() {
        let (store, _, user) = store().await;
        assert_eq!(store.submit_rating(&user.id, 3).await.unwrap(), None);
    }
}

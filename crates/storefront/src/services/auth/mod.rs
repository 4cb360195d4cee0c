//! Authentication service.
//!
//! Email/password registration and sign-in on top of the platform's auth
//! provider, plus the `users/{uid}` record written at registration.

mod error;

pub use error::AuthError;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use bukka_core::Email;

use crate::platform::document::timestamp_now;
use crate::platform::{AuthProvider, AuthUser, CollectionPath, DocumentStore, Fields, Query};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Label shown when the user record has no name.
const FALLBACK_DISPLAY_NAME: &str = "Profile";

/// Users collection.
pub(crate) const USERS: &str = "users";

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    auth: Arc<dyn AuthProvider>,
    documents: Arc<dyn DocumentStore>,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(auth: Arc<dyn AuthProvider>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { auth, documents }
    }

    /// Register a new account and write its user record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordMismatch` if the confirmation differs.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::EmailAlreadyInUse` if the email is already registered.
    /// Returns `AuthError::Repository` if the user record can't be written; the
    /// provider account is deleted again.
    #[instrument(skip(self, password, confirm))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
        confirm: &SecretString,
    ) -> Result<AuthUser, AuthError> {
        if password.expose_secret() != confirm.expose_secret() {
            return Err(AuthError::PasswordMismatch);
        }
        validate_password(password.expose_secret())?;
        let email = Email::parse(email)?;

        let user = self.auth.sign_up(&email, password).await?;

        let mut record = Fields::new();
        record.insert("name".to_owned(), Value::String(name.trim().to_owned()));
        record.insert("email".to_owned(), Value::String(email.as_str().to_owned()));
        record.insert("createdAt".to_owned(), timestamp_now());
        if let Err(e) = self
            .documents
            .create(&CollectionPath::root(USERS).doc(user.id.as_str()), record)
            .await
        {
            // Without the record the account could never sign in.
            warn!(user_id = %user.id, error = %e, "Rolling back registration");
            if let Err(rollback) = self.auth.delete_account().await {
                error!(
                    user_id = %user.id,
                    error = %rollback,
                    "Failed to roll back registration"
                );
            }
            return Err(e.into());
        }

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Sign in with email and password.
    ///
    /// Accounts without a user record are refused before the provider is asked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no user record carries the email.
    /// Returns `AuthError::WrongPassword` if the password is wrong.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<AuthUser, AuthError> {
        let email = Email::parse(email)?;

        let records = self
            .documents
            .query(
                &Query::collection(CollectionPath::root(USERS))
                    .where_eq("email", email.as_str())
                    .limit(1),
            )
            .await?;
        if records.is_empty() {
            return Err(AuthError::UserNotFound);
        }

        let user = self.auth.sign_in(&email, password).await?;
        info!(user_id = %user.id, "User signed in");
        Ok(user)
    }

    /// Sign out. The auth-state stream emits `None`.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if sign-out fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.auth.sign_out().await
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        self.auth.current_user()
    }

    /// Name for the navigation bar: the user record's `name`, or "Profile".
    pub async fn display_name(&self, user: Option<&AuthUser>) -> String {
        let Some(user) = user else {
            return FALLBACK_DISPLAY_NAME.to_owned();
        };
        match self
            .documents
            .get(&CollectionPath::root(USERS).doc(user.id.as_str()))
            .await
        {
            Ok(Some(doc)) => doc
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map_or_else(|| FALLBACK_DISPLAY_NAME.to_owned(), str::to_owned),
            Ok(None) => FALLBACK_DISPLAY_NAME.to_owned(),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Failed to read user record");
                FALLBACK_DISPLAY_NAME.to_owned()
            }
        }
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

/// Validate password requirements.
pub(crate) fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long."
        )));
    }
    Ok(())
}

//! Authentication provider abstraction.

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::watch;

use bukka_core::{Email, UserId};

use crate::services::auth::AuthError;

/// A signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Provider-issued user id.
    pub id: UserId,
    /// Account email.
    pub email: Email,
    /// Display name, if the provider has one.
    pub display_name: Option<String>,
}

/// Email/password authentication with an observable session.
///
/// Implementations hold the current session; every credential operation acts
/// on it. Credential changes are all-or-nothing on the provider side.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn sign_up(&self, email: &Email, password: &SecretString)
    -> Result<AuthUser, AuthError>;

    /// Sign in to an existing account.
    async fn sign_in(&self, email: &Email, password: &SecretString)
    -> Result<AuthUser, AuthError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Change the signed-in account's email.
    async fn update_email(&self, email: &Email) -> Result<AuthUser, AuthError>;

    /// Change the signed-in account's password.
    async fn update_password(&self, password: &SecretString) -> Result<(), AuthError>;

    /// Delete the signed-in account and end the session.
    async fn delete_account(&self) -> Result<(), AuthError>;

    /// The currently signed-in user, if any.
    fn current_user(&self) -> Option<AuthUser>;

    /// Auth-state stream. The value changes on sign-in, sign-out and account updates.
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>>;
}

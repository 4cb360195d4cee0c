//! Identity Toolkit REST client (email/password accounts).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{info, instrument};

use bukka_core::{Email, UserId};

use super::{Session, error_message};
use crate::platform::{AuthProvider, AuthUser};
use crate::services::auth::AuthError;

const IDENTITY_BASE: &str = "https://identitytoolkit.googleapis.com/v1";

/// Client for Identity Toolkit's `accounts:*` endpoints.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    session: Session,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: String,
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

impl AccountResponse {
    fn user(&self) -> Result<AuthUser, AuthError> {
        Ok(AuthUser {
            id: UserId::parse(&self.local_id).map_err(|e| AuthError::Provider(e.to_string()))?,
            email: Email::parse(&self.email).map_err(|_| AuthError::InvalidEmail)?,
            display_name: self.display_name.clone().filter(|n| !n.is_empty()),
        })
    }
}

impl IdentityClient {
    pub(crate) const fn new(http: reqwest::Client, session: Session) -> Self {
        Self { http, session }
    }

    async fn call(&self, endpoint: &str, body: &Value) -> Result<AccountResponse, AuthError> {
        let text = self.post(endpoint, body).await?;
        serde_json::from_str(&text).map_err(|e| AuthError::Provider(e.to_string()))
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<String, AuthError> {
        let url = format!(
            "{IDENTITY_BASE}/accounts:{endpoint}?key={}",
            urlencoding::encode(self.session.api_key())
        );
        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(AuthError::from_provider_code(&error_message(&text)));
        }
        Ok(text)
    }

    /// Sign in from an account response carrying fresh tokens.
    async fn establish(&self, account: AccountResponse) -> Result<AuthUser, AuthError> {
        let user = account.user()?;
        match (account.id_token, account.refresh_token) {
            (Some(id_token), Some(refresh_token)) => {
                let expires_in = account.expires_in.unwrap_or_else(|| "3600".to_owned());
                self.session
                    .establish(user.clone(), id_token, refresh_token, &expires_in)
                    .await;
            }
            _ => self.session.update_user(user.clone()),
        }
        Ok(user)
    }

    async fn require_token(&self) -> Result<String, AuthError> {
        self.session.id_token().await.ok_or(AuthError::NotSignedIn)
    }
}

#[async_trait]
impl AuthProvider for IdentityClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthUser, AuthError> {
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        let account = self.call("signUp", &body).await?;
        let user = self.establish(account).await?;
        info!(uid = %user.id, "Account created");
        Ok(user)
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthUser, AuthError> {
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        let account = self.call("signInWithPassword", &body).await?;
        self.establish(account).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.session.clear().await;
        Ok(())
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn update_email(&self, email: &Email) -> Result<AuthUser, AuthError> {
        let id_token = self.require_token().await?;
        let body = json!({
            "idToken": id_token,
            "email": email.as_str(),
            "returnSecureToken": true,
        });
        let account = self.call("update", &body).await?;
        self.establish(account).await
    }

    #[instrument(skip(self, password))]
    async fn update_password(&self, password: &SecretString) -> Result<(), AuthError> {
        let id_token = self.require_token().await?;
        let body = json!({
            "idToken": id_token,
            "password": password.expose_secret(),
            "returnSecureToken": true,
        });
        let account = self.call("update", &body).await?;
        self.establish(account).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_account(&self) -> Result<(), AuthError> {
        let id_token = self.require_token().await?;
        self.post("delete", &json!({ "idToken": id_token })).await?;
        self.session.clear().await;
        info!("Account deleted");
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.session.user()
    }

    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.watch()
    }
}

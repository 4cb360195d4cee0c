//! Firebase over REST.
//!
//! Uses `reqwest` 0.13 directly against the public REST surfaces:
//!
//! - Firestore `v1` for documents (`runQuery`, `PATCH` with `updateMask`, `commit`)
//! - Identity Toolkit `v1` for email/password accounts
//! - Cloud Storage for Firebase `v0` for avatar uploads
//!
//! The three clients share one [`Session`]: Identity Toolkit writes it on
//! sign-in, Firestore and Storage read the ID token from it. Expired tokens
//! are refreshed through the Secure Token API before use.
//!
//! Firestore has no REST streaming listener, so live subscriptions poll the
//! collection at the configured interval and deliver a snapshot whenever the
//! document set changes.

mod firestore;
mod identity;
mod storage;
pub mod values;

pub use firestore::FirestoreClient;
pub use identity::IdentityClient;
pub use storage::StorageClient;

use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::config::FirebaseConfig;
use crate::platform::{AuthUser, PlatformError};

/// Seconds before expiry at which an ID token is refreshed.
const REFRESH_MARGIN_SECS: i64 = 60;

/// The three REST clients sharing one session.
pub struct FirebasePlatform {
    pub firestore: FirestoreClient,
    pub auth: IdentityClient,
    pub storage: StorageClient,
}

impl FirebasePlatform {
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        let http = reqwest::Client::new();
        let session = Session::new(http.clone(), config.api_key.clone());
        Self {
            firestore: FirestoreClient::new(http.clone(), config, session.clone()),
            auth: IdentityClient::new(http.clone(), session.clone()),
            storage: StorageClient::new(http, config, session),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Tokens for the signed-in user.
struct Tokens {
    id_token: SecretString,
    refresh_token: SecretString,
    /// Unix seconds.
    expires_at: i64,
}

/// Shared sign-in state: tokens plus the observable current user.
#[derive(Clone)]
pub(crate) struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    http: reqwest::Client,
    api_key: SecretString,
    tokens: Mutex<Option<Tokens>>,
    user: watch::Sender<Option<AuthUser>>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

impl Session {
    fn new(http: reqwest::Client, api_key: SecretString) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            inner: Arc::new(SessionInner {
                http,
                api_key,
                tokens: Mutex::new(None),
                user,
            }),
        }
    }

    pub(crate) fn api_key(&self) -> &str {
        self.inner.api_key.expose_secret()
    }

    pub(crate) fn user(&self) -> Option<AuthUser> {
        self.inner.user.borrow().clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<Option<AuthUser>> {
        self.inner.user.subscribe()
    }

    /// Store fresh tokens and publish the user.
    pub(crate) async fn establish(
        &self,
        user: AuthUser,
        id_token: String,
        refresh_token: String,
        expires_in: &str,
    ) {
        *self.inner.tokens.lock().await = Some(Tokens {
            id_token: SecretString::from(id_token),
            refresh_token: SecretString::from(refresh_token),
            expires_at: expiry(expires_in),
        });
        self.inner.user.send_replace(Some(user));
    }

    /// Publish an updated user without touching tokens.
    pub(crate) fn update_user(&self, user: AuthUser) {
        self.inner.user.send_replace(Some(user));
    }

    pub(crate) async fn clear(&self) {
        *self.inner.tokens.lock().await = None;
        self.inner.user.send_replace(None);
    }

    /// A valid ID token, refreshing it first if it is about to expire.
    ///
    /// Returns `None` when nobody is signed in. A failed refresh ends the session.
    pub(crate) async fn id_token(&self) -> Option<String> {
        let mut guard = self.inner.tokens.lock().await;
        let tokens = guard.as_mut()?;

        if tokens.expires_at - REFRESH_MARGIN_SECS > Utc::now().timestamp() {
            return Some(tokens.id_token.expose_secret().to_owned());
        }

        let refresh_token = tokens.refresh_token.expose_secret().to_owned();
        match self.refresh(&refresh_token).await {
            Ok(fresh) => {
                debug!("Refreshed Firebase ID token");
                tokens.expires_at = expiry(&fresh.expires_in);
                tokens.id_token = SecretString::from(fresh.id_token);
                tokens.refresh_token = SecretString::from(fresh.refresh_token);
                Some(tokens.id_token.expose_secret().to_owned())
            }
            Err(e) => {
                warn!(error = %e, "Firebase token refresh failed, signing out");
                *guard = None;
                drop(guard);
                self.inner.user.send_replace(None);
                None
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, PlatformError> {
        let url = format!(
            "https://securetoken.googleapis.com/v1/token?key={}",
            urlencoding::encode(self.api_key())
        );
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let response = self.inner.http.post(&url).form(&params).send().await?;
        let body = read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn expiry(expires_in: &str) -> i64 {
    Utc::now().timestamp() + expires_in.parse::<i64>().unwrap_or(3600)
}

// =============================================================================
// Response handling
// =============================================================================

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Extract the error message from a Google API error body.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| body.chars().take(200).collect(),
        |envelope| envelope.error.message,
    )
}

fn error_status(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.status)
}

/// Check the status of a REST response and return its body text.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<String, PlatformError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(PlatformError::RateLimited(retry_after));
    }

    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }

    let message = error_message(&body);
    Err(match status {
        reqwest::StatusCode::NOT_FOUND => PlatformError::NotFound(message),
        reqwest::StatusCode::CONFLICT => PlatformError::AlreadyExists(message),
        reqwest::StatusCode::FORBIDDEN => PlatformError::PermissionDenied(message),
        reqwest::StatusCode::UNAUTHORIZED => PlatformError::Unauthenticated,
        reqwest::StatusCode::SERVICE_UNAVAILABLE => PlatformError::Unavailable(message),
        // A failed `exists` precondition on commit.
        reqwest::StatusCode::BAD_REQUEST
            if error_status(&body).as_deref() == Some("FAILED_PRECONDITION") =>
        {
            PlatformError::NotFound(message)
        }
        _ => {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Firebase API returned non-success status"
            );
            PlatformError::Remote {
                status: status.as_u16(),
                message,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_envelope() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        assert_eq!(error_message(body), "EMAIL_EXISTS");
        assert_eq!(error_status(body), None);
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message("upstream timeout"), "upstream timeout");
    }

    #[test]
    fn test_error_status() {
        let body = r#"{"error":{"code":400,"message":"no document","status":"FAILED_PRECONDITION"}}"#;
        assert_eq!(error_status(body).as_deref(), Some("FAILED_PRECONDITION"));
    }
}

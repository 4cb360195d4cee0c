//! Cloud Storage for Firebase REST client.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{Session, error_message};
use crate::config::FirebaseConfig;
use crate::platform::{ObjectStorage, StorageError};

/// Client for the `v0/b/{bucket}/o` object endpoints.
#[derive(Clone)]
pub struct StorageClient {
    http: reqwest::Client,
    bucket: String,
    session: Session,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    #[serde(default)]
    download_tokens: Option<String>,
}

impl StorageClient {
    pub(crate) fn new(http: reqwest::Client, config: &FirebaseConfig, session: Session) -> Self {
        Self {
            http,
            bucket: config.storage_bucket.clone(),
            session,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "https://firebasestorage.googleapis.com/v0/b/{}/o/{}",
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn media_url(&self, key: &str, token: &str) -> Result<Url, StorageError> {
        Ok(Url::parse(&format!(
            "{}?alt=media&token={}",
            self.object_url(key),
            urlencoding::encode(token)
        ))?)
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, size = bytes.len()))]
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let token = self
            .session
            .id_token()
            .await
            .ok_or(StorageError::Unauthenticated)?;
        let url = format!(
            "https://firebasestorage.googleapis.com/v0/b/{}/o?name={}",
            self.bucket,
            urlencoding::encode(key)
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::Upload {
                key: key.to_owned(),
                message: format!("{status}: {}", error_message(&text)),
            });
        }
        debug!(key, "Object uploaded");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn download_url(&self, key: &str) -> Result<Url, StorageError> {
        let mut request = self.http.get(self.object_url(key));
        if let Some(token) = self.session.id_token().await {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_owned()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(StorageError::Unauthenticated);
        }
        let metadata: ObjectMetadata = response.error_for_status()?.json().await?;

        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StorageError::NotFound(format!("{key} (no download token)")))?;
        self.media_url(key, token)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_media_url_encodes_key() {
        let config = FirebaseConfig {
            project_id: "bukka-test".to_string(),
            api_key: SecretString::from("AIzaTestKey"),
            storage_bucket: "bukka-test.appspot.com".to_string(),
            live_poll_interval: Duration::from_secs(2),
        };
        let http = reqwest::Client::new();
        let session = Session::new(http.clone(), config.api_key.clone());
        let client = StorageClient::new(http, &config, session);

        let url = client.media_url("avatars/u1", "tok-123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://firebasestorage.googleapis.com/v0/b/bukka-test.appspot.com/o/avatars%2Fu1?alt=media&token=tok-123"
        );
    }
}

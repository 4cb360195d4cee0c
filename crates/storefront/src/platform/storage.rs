//! Object storage abstraction.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Errors from blob storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upload was rejected or interrupted.
    #[error("upload of {key} failed: {message}")]
    Upload {
        /// Object key.
        key: String,
        /// Reason reported by the backend.
        message: String,
    },

    /// No object under this key.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The call needs a signed-in session.
    #[error("not signed in")]
    Unauthenticated,

    /// The backend returned a URL that does not parse.
    #[error("invalid download URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Blob storage keyed by path-like strings (`avatars/{uid}`).
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<(), StorageError>;

    /// A URL that retrieves the object under `key`.
    async fn download_url(&self, key: &str) -> Result<Url, StorageError>;
}

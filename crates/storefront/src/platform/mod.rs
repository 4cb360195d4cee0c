//! Hosted platform collaborators.
//!
//! The core never talks to a vendor SDK directly. It depends on three traits:
//!
//! - [`DocumentStore`] - get, query, create, merge, increment, delete, live-subscribe
//! - [`AuthProvider`] - email/password accounts and the auth-state stream
//! - [`ObjectStorage`] - blob upload and download URLs
//!
//! Two implementations ship with the crate:
//!
//! - [`memory`] - in-process platform used by tests and offline runs
//! - [`firebase`] - Firestore, Identity Toolkit and Cloud Storage over REST
//!
//! # Example
//!
//! ```rust,ignore
//! use bukka_storefront::platform::Platform;
//!
//! let platform = Platform::firebase(&config.firebase);
//! let doc = platform.documents.get(&CollectionPath::root("users").doc(uid)).await?;
//! ```

pub mod auth;
pub mod document;
pub mod firebase;
pub mod memory;
pub mod storage;

use std::sync::Arc;

use thiserror::Error;

pub use auth::{AuthProvider, AuthUser};
pub use document::{
    CollectionPath, Direction, Document, DocumentPath, DocumentStore, FieldMask, Fields, Query,
    Snapshot, Subscription,
};
pub use storage::{ObjectStorage, StorageError};

use crate::config::FirebaseConfig;

/// Errors returned by the document store.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Document or collection not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Create precondition failed.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Security rules rejected the call.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The call needs a signed-in session.
    #[error("Not signed in")]
    Unauthenticated,

    /// Rate limited by the platform.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The platform is unreachable or refused the call.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Any other non-success response.
    #[error("Remote error ({status}): {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Message from the error body.
        message: String,
    },

    /// A stored document could not be decoded.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl PlatformError {
    /// Whether this error means the target does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// The three collaborators bundled together.
#[derive(Clone)]
pub struct Platform {
    pub documents: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl Platform {
    /// Hosted platform over REST.
    #[must_use]
    pub fn firebase(config: &FirebaseConfig) -> Self {
        let hosted = firebase::FirebasePlatform::new(config);
        Self {
            documents: Arc::new(hosted.firestore),
            auth: Arc::new(hosted.auth),
            storage: Arc::new(hosted.storage),
        }
    }

    /// In-memory platform. The returned handle gives tests access to failure injection.
    #[must_use]
    pub fn memory() -> (Self, memory::MemoryPlatform) {
        let memory = memory::MemoryPlatform::new();
        let platform = Self {
            documents: Arc::new(memory.documents.clone()),
            auth: Arc::new(memory.auth.clone()),
            storage: Arc::new(memory.storage.clone()),
        };
        (platform, memory)
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

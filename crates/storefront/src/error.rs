//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for the catalog, cart and profile
//! services. Remote and storage failures are captured to Sentry via
//! [`AppError::report`] before they reach the caller.

use thiserror::Error;

use crate::platform::{PlatformError, StorageError};
use crate::services::auth::AuthError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// The operation needs a signed-in user.
    #[error("Sign-in required")]
    AuthRequired,

    /// Input rejected before anything was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Some writes of a batch failed; the rest were applied.
    #[error("Partial failure: {} of {attempted} operations failed", failed.len())]
    PartialFailure {
        /// Operations attempted.
        attempted: usize,
        /// Ids of the targets whose operation failed (still present).
        failed: Vec<String>,
    },

    /// Object storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Document store failed.
    #[error("Remote error: {0}")]
    Remote(#[from] PlatformError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

impl AppError {
    /// Capture server-side failures to Sentry and pass the error through.
    #[must_use]
    pub fn report(self) -> Self {
        if matches!(
            self,
            Self::Remote(_) | Self::Storage(_) | Self::PartialFailure { .. }
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Operation failed"
            );
        }
        self
    }

    /// Message suitable for showing to the user.
    ///
    /// Don't expose remote error details to users.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthRequired => "Please sign in to continue.".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::NotFound(_) => "We couldn't find that.".to_string(),
            Self::PartialFailure { .. } => {
                "Some items could not be removed. Please try again.".to_string()
            }
            Self::Storage(_) => "Upload failed. Please try again.".to_string(),
            Self::Remote(PlatformError::RateLimited(_)) => {
                "Too many requests. Please try again shortly.".to_string()
            }
            Self::Remote(_) => "Something went wrong. Please try again.".to_string(),
            Self::Auth(err) => err.user_message(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("item_id", "jollof-rice")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("food-items/suya".to_string());
        assert_eq!(err.to_string(), "Not found: food-items/suya");

        let err = AppError::PartialFailure {
            attempted: 3,
            failed: vec!["suya".to_string()],
        };
        assert_eq!(err.to_string(), "Partial failure: 1 of 3 operations failed");
    }

    #[test]
    fn test_user_message_hides_remote_detail() {
        let err = AppError::Remote(PlatformError::Remote {
            status: 500,
            message: "internal stack trace".to_string(),
        });
        assert!(!err.user_message().contains("stack trace"));

        let err = AppError::Validation("Please choose an option.".to_string());
        assert_eq!(err.user_message(), "Please choose an option.");
    }

    #[test]
    fn test_auth_messages_pass_through() {
        let err = AppError::from(AuthError::TooManyAttempts);
        assert_eq!(err.user_message(), "Too many attempts. Please try again later.");
    }

    #[test]
    fn test_report_returns_same_error() {
        let err = AppError::Remote(PlatformError::Unauthenticated).report();
        assert!(matches!(err, AppError::Remote(PlatformError::Unauthenticated)));
    }
}

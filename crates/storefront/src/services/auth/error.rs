//! Authentication error types.

use thiserror::Error;

use crate::platform::PlatformError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email")]
    InvalidEmail,

    /// Wrong password (or the provider's generic invalid-credential answer).
    #[error("invalid credentials")]
    WrongPassword,

    /// No account for this email.
    #[error("user not found")]
    UserNotFound,

    /// An account with this email already exists.
    #[error("email already in use")]
    EmailAlreadyInUse,

    /// The provider is throttling this account.
    #[error("too many attempts")]
    TooManyAttempts,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Sensitive change needs a fresh sign-in.
    #[error("recent sign-in required")]
    RequiresRecentLogin,

    /// No session.
    #[error("not signed in")]
    NotSignedIn,

    /// Any other provider error, carrying the provider's message.
    #[error("auth provider error: {0}")]
    Provider(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Document store error while reading or writing the user record.
    #[error("database error: {0}")]
    Repository(#[from] PlatformError),
}

impl From<bukka_core::EmailError> for AuthError {
    fn from(_: bukka_core::EmailError) -> Self {
        Self::InvalidEmail
    }
}

impl AuthError {
    /// Translate a provider error code.
    ///
    /// Identity Toolkit reports errors as `CODE` or `CODE : detail`.
    #[must_use]
    pub fn from_provider_code(message: &str) -> Self {
        let (code, detail) = message
            .split_once(" : ")
            .map_or((message.trim(), None), |(c, d)| (c.trim(), Some(d.trim())));

        match code {
            "EMAIL_EXISTS" => Self::EmailAlreadyInUse,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => Self::WrongPassword,
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => Self::UserNotFound,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "INVALID_EMAIL" | "MISSING_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" => Self::WeakPassword(
                detail
                    .unwrap_or("Password should be at least 6 characters")
                    .to_owned(),
            ),
            "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" | "TOKEN_EXPIRED" => Self::RequiresRecentLogin,
            "INVALID_ID_TOKEN" | "USER_DISABLED" => Self::NotSignedIn,
            _ => Self::Provider(message.to_owned()),
        }
    }

    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail => "Please enter a valid email address.".to_owned(),
            Self::WrongPassword => "Incorrect password. Please try again.".to_owned(),
            Self::UserNotFound => {
                "No account found with this email. Please sign up first.".to_owned()
            }
            Self::EmailAlreadyInUse => {
                "An account with this email already exists. Please sign in.".to_owned()
            }
            Self::TooManyAttempts => "Too many attempts. Please try again later.".to_owned(),
            Self::WeakPassword(reason) => reason.clone(),
            Self::PasswordMismatch => "Passwords do not match.".to_owned(),
            Self::RequiresRecentLogin => {
                "Please sign in again before changing this.".to_owned()
            }
            Self::NotSignedIn => "Please sign in to continue.".to_owned(),
            Self::Provider(message) => message.clone(),
            Self::Http(_) | Self::Repository(_) => "Something went wrong.".to_owned(),
        }
    }
}

//! Command implementations.

pub mod auth;
pub mod cart;
pub mod menu;
pub mod profile;

use secrecy::SecretString;
use thiserror::Error;
use tracing::info;

use bukka_storefront::error::AppError;
use bukka_storefront::platform::AuthUser;
use bukka_storefront::services::auth::AuthError;
use bukka_storefront::state::AppState;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The command needs `--email` and `--password`.
    #[error("Missing credentials: pass --email and --password or set BUKKA_EMAIL and BUKKA_PASSWORD")]
    MissingCredentials,

    /// An id argument is malformed.
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// Reading an input file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The menu file is not valid YAML.
    #[error("Invalid menu file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl CliError {
    /// Message for the person running the command.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::App(e) => e.user_message(),
            Self::Auth(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Email and password given on the command line or in the environment.
pub struct Credentials {
    email: Option<String>,
    password: Option<SecretString>,
}

impl Credentials {
    #[must_use]
    pub fn new(email: Option<String>, password: Option<String>) -> Self {
        Self {
            email,
            password: password.map(SecretString::from),
        }
    }

    /// Both parts, or `MissingCredentials`.
    ///
    /// # Errors
    ///
    /// Returns `CliError::MissingCredentials` if either part is absent.
    pub fn require(&self) -> Result<(&str, &SecretString), CliError> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(CliError::MissingCredentials),
        }
    }

    /// Whether any credential was given.
    #[must_use]
    pub const fn given(&self) -> bool {
        self.email.is_some() || self.password.is_some()
    }
}

/// Sign in with the given credentials.
///
/// # Errors
///
/// Returns `CliError::MissingCredentials` or the sign-in failure.
pub async fn sign_in(state: &AppState, credentials: &Credentials) -> Result<AuthUser, CliError> {
    let (email, password) = credentials.require()?;
    let user = state.auth().sign_in(email, password).await?;
    bukka_storefront::error::set_sentry_user(&user.id, Some(user.email.as_str()));
    info!(user_id = %user.id, "Signed in");
    Ok(user)
}

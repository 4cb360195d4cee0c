//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FIREBASE_PROJECT_ID` - Firebase project id
//! - `FIREBASE_API_KEY` - Web API key of the Firebase project
//! - `FIREBASE_STORAGE_BUCKET` - Storage bucket (e.g., your-project.appspot.com)
//!
//! ## Optional
//! - `BUKKA_SEARCH_DEBOUNCE_MS` - Search quiet period (default: 300)
//! - `BUKKA_LIVE_POLL_INTERVAL_MS` - Live cart poll interval (default: 2000)
//! - `BUKKA_CATALOG_CACHE_CAPACITY` - Cached catalog snapshots (default: 8)
//! - `BUKKA_CURRENCY` - Menu currency (default: NGN)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use bukka_core::CurrencyCode;

const MIN_API_KEY_LENGTH: usize = 20;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Hosted platform configuration
    pub firebase: FirebaseConfig,
    /// Client behaviour settings
    pub client: ClientSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Firebase project id
    pub project_id: String,
    /// Web API key
    pub api_key: SecretString,
    /// Storage bucket for avatars
    pub storage_bucket: String,
    /// How often live subscriptions re-read their collection
    pub live_poll_interval: Duration,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &"[REDACTED]")
            .field("storage_bucket", &self.storage_bucket)
            .field("live_poll_interval", &self.live_poll_interval)
            .finish()
    }
}

/// Settings for the catalog, cart and profile services.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Quiet period before a search runs
    pub search_debounce: Duration,
    /// Maximum cached catalog snapshots
    pub catalog_cache_capacity: u64,
    /// Currency menu prices are quoted in
    pub currency: CurrencyCode,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(300),
            catalog_cache_capacity: 8,
            currency: CurrencyCode::NGN,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let firebase = FirebaseConfig::from_env()?;
        let client = ClientSettings::from_env()?;
        let sentry_sample_rate = get_env_or_default("SENTRY_SAMPLE_RATE", "1.0")
            .parse::<f32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SENTRY_SAMPLE_RATE".to_string(), e.to_string())
            })?;

        Ok(Self {
            firebase,
            client,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
        })
    }
}

impl FirebaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_key = get_validated_secret("FIREBASE_API_KEY")?;
        validate_api_key_length(&api_key, "FIREBASE_API_KEY")?;

        Ok(Self {
            project_id: get_required_env("FIREBASE_PROJECT_ID")?,
            api_key,
            storage_bucket: get_required_env("FIREBASE_STORAGE_BUCKET")?,
            live_poll_interval: get_millis("BUKKA_LIVE_POLL_INTERVAL_MS", 2000)?,
        })
    }
}

impl ClientSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let catalog_cache_capacity = get_env_or_default("BUKKA_CATALOG_CACHE_CAPACITY", "8")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BUKKA_CATALOG_CACHE_CAPACITY".to_string(), e.to_string())
            })?;
        let currency = get_env_or_default("BUKKA_CURRENCY", "NGN")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("BUKKA_CURRENCY".to_string(), e))?;

        Ok(Self {
            search_debounce: get_millis("BUKKA_SEARCH_DEBOUNCE_MS", 300)?,
            catalog_cache_capacity,
            currency,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a millisecond duration with a default value.
fn get_millis(key: &str, default: u64) -> Result<Duration, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(Duration::from_millis(default));
    };
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that an API key meets minimum length requirements.
fn validate_api_key_length(key: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = key.expose_secret();
    if value.len() < MIN_API_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_API_KEY_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API keys are random and have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the Firebase console."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

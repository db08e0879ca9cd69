//! Cart sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `SUITCART_API_URL` - Base URL of the cart API; without it only local
//!   storage is available
//! - `SUITCART_API_KEY` - Cart API key (required when `SUITCART_API_URL` is set)
//! - `SUITCART_HTTP_TIMEOUT_SECS` - Cart API request timeout (default: 10)
//! - `SUITCART_STORAGE_DIR` - Directory for device-local carts (default: .suitcart)
//! - `SUITCART_STORAGE_QUOTA_BYTES` - Largest value local storage accepts
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STORAGE_DIR: &str = ".suitcart";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart sync configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Cart API settings, if a server is configured
    pub api: Option<RemoteApiConfig>,
    /// Directory for device-local carts
    pub storage_dir: PathBuf,
    /// Largest value local storage accepts
    pub storage_quota_bytes: Option<usize>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Cart API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct RemoteApiConfig {
    /// Base URL; cart endpoints are resolved below it
    pub base_url: Url,
    /// API key sent as a bearer token
    pub api_key: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if the
    /// API URL is set without an API key.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = env_var("SUITCART_API_URL")
            .map(|url| RemoteApiConfig::from_env(&url))
            .transpose()?;

        Ok(Self {
            api,
            storage_dir: env_var("SUITCART_STORAGE_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR), PathBuf::from),
            storage_quota_bytes: parse_env("SUITCART_STORAGE_QUOTA_BYTES")?,
            sentry_dsn: env_var("SENTRY_DSN"),
            sentry_environment: env_var("SENTRY_ENVIRONMENT"),
        })
    }
}

impl RemoteApiConfig {
    fn from_env(raw_url: &str) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(raw_url)?;
        let api_key = env_var("SUITCART_API_KEY")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("SUITCART_API_KEY".to_string()))?;
        let timeout_secs = parse_env("SUITCART_HTTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Parse and check the cart API base URL.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar("SUITCART_API_URL".to_string(), reason);

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be a base".to_string()));
    }
    Ok(url)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Read `key`, treating a blank value as unset.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse `key` if it is set.
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_var(key).map(|raw| parse_value(key, &raw)).transpose()
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

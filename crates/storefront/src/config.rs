//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SABLE_API_ROOT` - Base URL of the backend REST API
//!   (e.g., `https://api.sablecommerce.io/api/v1`)
//!
//! ## Optional
//! - `SABLE_HTTP_TIMEOUT_SECS` - Per-request timeout in seconds
//!   (default: 30)

use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Backend API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL the REST routes hang off of.
    pub api_root: Url,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl ApiConfig {
    /// Create a configuration directly from an API root URL.
    #[must_use]
    pub const fn new(api_root: Url) -> Self {
        Self {
            api_root,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `SABLE_API_ROOT` is missing or unparseable,
    /// or if `SABLE_HTTP_TIMEOUT_SECS` is present but not an integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Exists so tests can supply variables without mutating the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_root = lookup("SABLE_API_ROOT")
            .ok_or_else(|| ConfigError::MissingEnvVar("SABLE_API_ROOT".to_string()))?;
        let api_root = Url::parse(&raw_root)
            .map_err(|e| ConfigError::InvalidEnvVar("SABLE_API_ROOT".to_string(), e.to_string()))?;

        let timeout_secs = match lookup("SABLE_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("SABLE_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_root,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

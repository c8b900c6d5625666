//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings that do not involve the backend: where the token lives and how
/// much to log. The `token` subcommands need nothing else.
#[derive(Clone, Debug)]
pub struct LocalConfig {
    /// Token taken straight from the environment; wins over the token file.
    pub token_override: Option<String>,
    pub token_path: PathBuf,
    pub log_level: Level,
}

impl LocalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Session Settings ---
        let token_override = var("MODEL_TEST_TOKEN").filter(|v| !v.trim().is_empty());
        let token_path = var("MODEL_TEST_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.model-test-token"));

        // --- Logging ---
        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            token_override,
            token_path,
            log_level,
        })
    }
}

/// Holds all configuration a backend call needs.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the backend, without a trailing slash.
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub local: LocalConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Backend Settings ---
        let api_base_url = var("MODEL_TEST_API_URL")
            .or_else(|| var("NEXT_PUBLIC_API_URL"))
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("MODEL_TEST_API_URL".to_string()))?;
        let api_base_url = api_base_url.trim().trim_end_matches('/').to_string();
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "MODEL_TEST_API_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        let timeout_str = var("REQUEST_TIMEOUT_SECS").unwrap_or_else(|| "15".to_string());
        let timeout_secs = timeout_str
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "REQUEST_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a positive number of seconds", timeout_str),
                )
            })?;

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            local: LocalConfig::from_vars(var)?,
        })
    }
}

fn load_dotenv() {
    if !cfg!(test) {
        dotenvy::dotenv().ok();
    }
}

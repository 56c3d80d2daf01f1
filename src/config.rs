//! Startup configuration
//!
//! Read once from the environment (after loading `.env`). A missing API key
//! is fatal: the server never starts without a usable provider.

use crate::session::DEFAULT_INSTRUCTION;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_SESSION_GRACE_SECS: u64 = 30;
const DEFAULT_SESSION_IDLE_SECS: u64 = 600;

/// Errors that halt startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GOOGLE_API_KEY not found. Please add it to your .env file.")]
    MissingApiKey,
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub default_instruction: String,
    /// How long a disconnected session waits for its client to reconnect
    pub session_grace: Duration,
    /// How long an unwatched session may sit idle before eviction
    pub session_idle_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("GOOGLE_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let port = match get("CHAT_PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "CHAT_PORT",
                    value,
                })?,
            None => DEFAULT_PORT,
        };

        let request_timeout = seconds(
            get("CHAT_REQUEST_TIMEOUT_SECS"),
            "CHAT_REQUEST_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
            1,
        )?;
        let session_grace = seconds(
            get("CHAT_SESSION_GRACE_SECS"),
            "CHAT_SESSION_GRACE_SECS",
            DEFAULT_SESSION_GRACE_SECS,
            0,
        )?;
        let session_idle_timeout = seconds(
            get("CHAT_SESSION_IDLE_SECS"),
            "CHAT_SESSION_IDLE_SECS",
            DEFAULT_SESSION_IDLE_SECS,
            1,
        )?;

        Ok(Self {
            api_key,
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: get("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            port,
            request_timeout,
            default_instruction: get("CHAT_DEFAULT_INSTRUCTION")
                .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
            session_grace,
            session_idle_timeout,
        })
    }
}

/// Parse a whole number of seconds no smaller than `min`
fn seconds(
    value: Option<String>,
    key: &'static str,
    default: u64,
    min: u64,
) -> Result<Duration, ConfigError> {
    let secs = match value {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs >= min => secs,
            _ => return Err(ConfigError::InvalidValue { key, value }),
        },
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

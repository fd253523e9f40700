//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config. Each crate owns its own
//! `*Config::from_env()`; this module holds the process-level settings
//! and the parsing helpers they share.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default request body cap (64 KiB)
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Comma-separated list of allowed CORS origins, `*` for any
    pub cors_allowed_origins: String,

    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,

    /// Runtime configuration
    pub rust_log: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let max_body_bytes = env_or("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES);
        if max_body_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_BODY_BYTES must be greater than zero"));
        }

        Ok(Self {
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
            max_body_bytes,
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "chatline=info".to_string()),
            port: env_or("PORT", 3000),
        })
    }
}

/// Read and parse an environment variable, falling back to `default`
/// when it is unset or unparsable.
pub fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment value");
            default
        }),
        Err(_) => default,
    }
}

/// Read an environment variable holding a number of seconds
pub fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_or(key, default_secs))
}

/// Read an optional, non-empty string environment variable
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

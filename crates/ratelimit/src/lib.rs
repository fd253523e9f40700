//! Per-client request rate limiting
//!
//! Each client identifier owns a log of admission instants and is admitted
//! at most `max_requests` times per rolling `window`. Entries older than the
//! window are purged lazily; a client spacing requests at `window /
//! max_requests` or slower is never refused.
//!
//! Buckets live in one process-wide LRU map bounded by `max_clients`; buckets
//! idle longer than the retention horizon are dropped lazily.

mod bucket;
mod limiter;

pub use limiter::RateLimiter;

use std::time::Duration;

use thiserror::Error;

use chatline_common::{env_or, env_secs};

/// Default requests admitted per window
pub const DEFAULT_MAX_REQUESTS: u32 = 10;

/// Default window length in seconds
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;

/// Default bound on tracked client buckets
pub const DEFAULT_MAX_CLIENTS: usize = 10_000;

/// Default idle retention for a bucket, in seconds
pub const DEFAULT_RETENTION_SECONDS: u64 = 600;

/// Longest accepted window, in seconds
pub const MAX_WINDOW_SECONDS: u64 = 7 * 24 * 3600;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateLimitError {
    #[error("Rate limiter configuration error: {0}")]
    Configuration(String),
}

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    /// Most client buckets held at once
    pub max_clients: usize,
    /// Idle time after which a bucket is forgotten (never shorter than `window`)
    pub retention: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: Duration::from_secs(DEFAULT_WINDOW_SECONDS),
            max_clients: DEFAULT_MAX_CLIENTS,
            retention: Duration::from_secs(DEFAULT_RETENTION_SECONDS),
        }
    }
}

impl RateLimitConfig {
    /// Create rate limit config from environment variables
    pub fn from_env() -> Result<Self, RateLimitError> {
        let config = Self {
            max_requests: env_or("MAX_REQUESTS", DEFAULT_MAX_REQUESTS),
            window: env_secs("WINDOW_SECONDS", DEFAULT_WINDOW_SECONDS),
            max_clients: env_or("RATE_LIMIT_MAX_CLIENTS", DEFAULT_MAX_CLIENTS),
            retention: env_secs("RATE_LIMIT_RETENTION_SECS", DEFAULT_RETENTION_SECONDS),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject capacities that would make the limiter meaningless
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max_requests == 0 {
            return Err(RateLimitError::Configuration(
                "MAX_REQUESTS must be at least 1".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(RateLimitError::Configuration(
                "WINDOW_SECONDS must be at least 1".to_string(),
            ));
        }
        if self.window > Duration::from_secs(MAX_WINDOW_SECONDS) {
            return Err(RateLimitError::Configuration(format!(
                "WINDOW_SECONDS must be at most {}",
                MAX_WINDOW_SECONDS
            )));
        }
        if self.max_clients == 0 {
            return Err(RateLimitError::Configuration(
                "RATE_LIMIT_MAX_CLIENTS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Retention horizon, clamped so a forgotten bucket is always a full one
    pub fn effective_retention(&self) -> Duration {
        self.retention.max(self.window)
    }
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request admitted; `remaining` more would be admitted right now
    Admitted { remaining: u32 },
    /// Request refused; one slot frees up after `retry_after`
    Rejected { retry_after: Duration },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

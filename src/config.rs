use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::client::DEFAULT_ENDPOINT;
use crate::config_validator::ConfigValidator;
use crate::error::{ThrottlerError, ThrottlerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum submissions per window
    pub capacity: usize,

    /// Replenishment interval
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// Document creation endpoint
    pub endpoint: String,

    /// Per-request transport timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Number of submission workers
    pub workers: usize,

    /// Maximum queued submissions before callers wait
    pub queue_depth: usize,

    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 5,
            window: Duration::from_secs(1),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
            workers: 4,
            queue_depth: 64,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and a `.env` file, if present)
    pub fn from_env() -> ThrottlerResult<Self> {
        let config = Self::parse_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read environment variables without validating them.
    ///
    /// Callers layering further overrides on top must call [`Config::validate`] afterwards.
    pub fn parse_env() -> ThrottlerResult<Self> {
        dotenv::dotenv().ok();
        Self::parse_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> ThrottlerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::parse_lookup(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::from_lookup`] but only rejects values that fail to parse
    pub fn parse_lookup<F>(lookup: F) -> ThrottlerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            capacity: parse_var(&lookup, "THROTTLE_CAPACITY", defaults.capacity)?,
            window: duration_var(&lookup, "THROTTLE_WINDOW", defaults.window)?,
            endpoint: lookup("SUBMIT_ENDPOINT").unwrap_or(defaults.endpoint),
            request_timeout: duration_var(&lookup, "REQUEST_TIMEOUT", defaults.request_timeout)?,
            workers: parse_var(&lookup, "SUBMIT_WORKERS", defaults.workers)?,
            queue_depth: parse_var(&lookup, "QUEUE_DEPTH", defaults.queue_depth)?,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        Ok(config)
    }

    /// Check every value for consistency
    pub fn validate(&self) -> ThrottlerResult<()> {
        ConfigValidator::validate_pool(self.capacity, self.window)?;
        ConfigValidator::validate_endpoint(&self.endpoint)?;
        ConfigValidator::validate_timeout(self.request_timeout)?;
        ConfigValidator::validate_queue(self.workers, self.queue_depth)?;
        Ok(())
    }
}

fn parse_var<F, V>(lookup: &F, key: &str, default: V) -> ThrottlerResult<V>
where
    F: Fn(&str) -> Option<String>,
    V: FromStr,
    V::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ThrottlerError::Config(format!("Invalid {}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn duration_var<F>(lookup: &F, key: &str, default: Duration) -> ThrottlerResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => humantime::parse_duration(raw.trim())
            .map_err(|e| ThrottlerError::Config(format!("Invalid {}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

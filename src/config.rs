//! Runtime configuration, read from the environment.

use std::time::Duration;

use backon::ExponentialBuilder;
use thiserror::Error;

use crate::receipt::DEFAULT_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid receipt prefix {0:?}: must be non-empty and contain no whitespace")]
    InvalidPrefix(String),
    #[error("invalid fallback policy {0:?}: expected \"scan\" or \"fail\"")]
    InvalidFallback(String),
}

/// What the allocator does when the counter transaction cannot commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Derive `max + 1` from a full scan of the scope's records. Racy under
    /// concurrent writers, but keeps record creation available.
    #[default]
    ScanRecords,
    /// Surface the store error to the caller.
    Fail,
}

impl std::str::FromStr for FallbackPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scan" => Ok(FallbackPolicy::ScanRecords),
            "fail" => Ok(FallbackPolicy::Fail),
            _ => Err(ConfigError::InvalidFallback(s.to_string())),
        }
    }
}

/// Retry budget for conflicting counter transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first conflict.
    pub max_retries: usize,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 10,
            max_delay_ms: 1_000,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with jitter.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

/// Default bound on waiting for an owner's scope lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingConfig {
    pub prefix: String,
    pub fallback: FallbackPolicy,
    pub retry: RetryConfig,
    /// How long allocation, repair and reset wait for the owner's lock.
    pub lock_timeout_ms: u64,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            fallback: FallbackPolicy::default(),
            retry: RetryConfig::default(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl NumberingConfig {
    /// Load configuration from environment variables.
    ///
    /// - `RECEIPT_PREFIX`: receipt prefix (default: `REC`)
    /// - `RECEIPT_FALLBACK`: `scan` or `fail` (default: `scan`)
    /// - `RECEIPT_TXN_MAX_RETRIES`: conflict retries (default: 5)
    /// - `RECEIPT_TXN_RETRY_INITIAL_MS`: initial backoff in ms (default: 10)
    /// - `RECEIPT_TXN_RETRY_MAX_MS`: maximum backoff in ms (default: 1000)
    /// - `RECEIPT_LOCK_TIMEOUT_MS`: scope lock wait in ms (default: 5000)
    ///
    /// Unparsable numeric values fall back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let prefix = match lookup("RECEIPT_PREFIX") {
            Some(prefix) => validate_prefix(prefix)?,
            None => default.prefix,
        };
        let fallback = match lookup("RECEIPT_FALLBACK") {
            Some(policy) => policy.parse()?,
            None => default.fallback,
        };
        let retry = RetryConfig {
            max_retries: parsed(&lookup, "RECEIPT_TXN_MAX_RETRIES")
                .unwrap_or(default.retry.max_retries),
            initial_delay_ms: parsed(&lookup, "RECEIPT_TXN_RETRY_INITIAL_MS")
                .unwrap_or(default.retry.initial_delay_ms),
            max_delay_ms: parsed(&lookup, "RECEIPT_TXN_RETRY_MAX_MS")
                .unwrap_or(default.retry.max_delay_ms),
        };

        let lock_timeout_ms =
            parsed(&lookup, "RECEIPT_LOCK_TIMEOUT_MS").unwrap_or(default.lock_timeout_ms);

        Ok(Self {
            prefix,
            fallback,
            retry,
            lock_timeout_ms,
        })
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Result<Self, ConfigError> {
        self.prefix = validate_prefix(prefix.into())?;
        Ok(self)
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn validate_prefix(prefix: String) -> Result<String, ConfigError> {
    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidPrefix(prefix));
    }
    Ok(prefix)
}

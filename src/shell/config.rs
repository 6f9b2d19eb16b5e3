// Process configuration, read once at startup from EXPLORER_* environment variables.
//
// Unset or blank variables take their defaults; set but unparsable ones are an error.

use crate::modules::commits_sync::adapters::outbound::commit_source_github::{
    DEFAULT_API_URL, GithubConfig,
};
use crate::shared::infrastructure::retry::RetryConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub monitoring_interval: Duration,
    /// Bound on one upstream request and on every other single outbound call.
    pub upstream_timeout: Duration,
    /// Bound on draining every page of one fetch window.
    pub sync_timeout: Duration,
    pub retry: RetryConfig,
    /// Redeliveries of one bus message after retryable failures, and their spacing.
    pub redelivery: RetryConfig,
    pub ack_timeout: Duration,
    pub max_concurrent_syncs: usize,
    pub watermark_store_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &'static str, default: u64| parse_or(key, raw(key), default);

        let at_least_one = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            let value = parsed(key, default)?;
            if value == 0 {
                return Err(ConfigError {
                    key,
                    value: "0".into(),
                    reason: "must be at least 1".into(),
                });
            }
            Ok(value)
        };

        let max_concurrent_syncs = at_least_one("EXPLORER_MAX_CONCURRENT_SYNCS", 8)?;
        let upstream_timeout =
            Duration::from_secs(at_least_one("EXPLORER_UPSTREAM_TIMEOUT_SECS", 30)?);
        let sync_timeout = Duration::from_secs(at_least_one("EXPLORER_SYNC_TIMEOUT_SECS", 600)?);
        if sync_timeout < upstream_timeout {
            return Err(ConfigError {
                key: "EXPLORER_SYNC_TIMEOUT_SECS",
                value: sync_timeout.as_secs().to_string(),
                reason: "must not be shorter than EXPLORER_UPSTREAM_TIMEOUT_SECS".into(),
            });
        }

        Ok(Self {
            port: parse_or("EXPLORER_PORT", raw("EXPLORER_PORT"), 8080)?,
            github_token: raw("EXPLORER_GITHUB_TOKEN"),
            github_api_url: raw("EXPLORER_GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            monitoring_interval: Duration::from_secs(
                parsed("EXPLORER_MONITORING_INTERVAL_SECS", 60)?.max(1),
            ),
            upstream_timeout,
            sync_timeout,
            retry: RetryConfig::new(
                parse_or("EXPLORER_MAX_RETRIES", raw("EXPLORER_MAX_RETRIES"), 3)?,
                Duration::from_millis(parsed("EXPLORER_BACKOFF_INITIAL_MS", 1_000)?),
                Duration::from_millis(parsed("EXPLORER_BACKOFF_MAX_MS", 60_000)?),
                RetryConfig::DEFAULT.backoff_multiplier,
            ),
            redelivery: RetryConfig::new(
                parse_or("EXPLORER_MAX_REDELIVERIES", raw("EXPLORER_MAX_REDELIVERIES"), 5)?,
                Duration::from_millis(parsed("EXPLORER_REDELIVERY_DELAY_MS", 5_000)?),
                Duration::from_millis(parsed("EXPLORER_REDELIVERY_MAX_DELAY_MS", 300_000)?),
                RetryConfig::DEFAULT.backoff_multiplier,
            ),
            ack_timeout: Duration::from_secs(at_least_one("EXPLORER_ACK_TIMEOUT_SECS", 30)?),
            max_concurrent_syncs: max_concurrent_syncs as usize,
            watermark_store_path: raw("EXPLORER_WATERMARK_STORE_PATH").map(PathBuf::from),
        })
    }

    pub fn github(&self) -> GithubConfig {
        GithubConfig {
            api_url: self.github_api_url.clone(),
            token: self.github_token.clone(),
            timeout: self.upstream_timeout,
            ..GithubConfig::default()
        }
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError {
                key,
                reason: e.to_string(),
                value,
            })
        }
    }
}

//! Configuration management for kvsync.

use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://apigee.googleapis.com/v1";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_MAX_PAGES: usize = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Connection and tuning settings loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Remote API base URL
    pub base_url: String,
    /// Bearer credential supplied by the caller
    pub token: String,
    /// Organization name
    pub organization: String,
    /// Environment name
    pub environment: String,
    /// Entries requested per page
    pub page_size: u32,
    /// Page cap when reading a map
    pub max_pages: usize,
    /// Per-call timeout
    pub timeout: Duration,
    /// Writes in flight within one phase
    pub concurrency: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("organization", &self.organization)
            .field("environment", &self.environment)
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .field("timeout", &self.timeout)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let base_url = lookup("KVSYNC_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let token = required("KVSYNC_TOKEN")?;
        let organization = required("KVSYNC_ORG")?;
        let environment = required("KVSYNC_ENV")?;

        let page_size = parse_or(&lookup, "KVSYNC_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let max_pages = parse_or(&lookup, "KVSYNC_MAX_PAGES", DEFAULT_MAX_PAGES)?;
        let timeout_secs = parse_or(&lookup, "KVSYNC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let concurrency = parse_or(&lookup, "KVSYNC_CONCURRENCY", DEFAULT_CONCURRENCY)?;

        if page_size == 0 {
            return Err(ConfigError::Invalid("KVSYNC_PAGE_SIZE"));
        }
        if max_pages == 0 {
            return Err(ConfigError::Invalid("KVSYNC_MAX_PAGES"));
        }
        if concurrency == 0 {
            return Err(ConfigError::Invalid("KVSYNC_CONCURRENCY"));
        }

        Ok(Self {
            base_url,
            token,
            organization,
            environment,
            page_size,
            max_pages,
            timeout: Duration::from_secs(timeout_secs),
            concurrency,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid {0} value")]
    Invalid(&'static str),
}

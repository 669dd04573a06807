//! Adapter configuration.

use rental_core::Money;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Strapi connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmsConfig {
    /// Backend root, without the `/api` suffix (default: `http://localhost:1337`)
    pub base_url: String,
    /// Per-request HTTP timeout in milliseconds (default: 10000)
    pub request_timeout_ms: u64,
    /// Daily price used for cars without one, in whole units (default: 100)
    pub default_daily_price: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1337".to_string(),
            request_timeout_ms: 10_000,
            default_daily_price: 100,
        }
    }
}

impl CmsConfig {
    /// Load from `CMS_BASE_URL`, `CMS_REQUEST_TIMEOUT_MS` and `CMS_DEFAULT_DAILY_PRICE`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through `lookup`, which maps a variable name to its value.
    ///
    /// Unset or unparseable variables fall back to their defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            base_url: lookup("CMS_BASE_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.base_url),
            request_timeout_ms: parsed("CMS_REQUEST_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .unwrap_or(defaults.request_timeout_ms),
            default_daily_price: parsed("CMS_DEFAULT_DAILY_PRICE")
                .filter(|units| Money::checked_from_units(*units).is_some_and(|m| !m.is_zero()))
                .unwrap_or(defaults.default_daily_price),
        }
    }

    /// Request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Fallback daily price
    #[must_use]
    pub const fn default_price(&self) -> Money {
        Money::from_units(self.default_daily_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CmsConfig::from_lookup(|_| None);
        assert_eq!(config, CmsConfig::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.default_price(), Money::from_units(100));
    }

    #[test]
    fn test_overrides_and_trailing_slash() {
        let config = CmsConfig::from_lookup(|key| match key {
            "CMS_BASE_URL" => Some("https://cms.example.org/".to_string()),
            "CMS_REQUEST_TIMEOUT_MS" => Some("2500".to_string()),
            "CMS_DEFAULT_DAILY_PRICE" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "https://cms.example.org");
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
        assert_eq!(config.default_daily_price, 100);
    }
}

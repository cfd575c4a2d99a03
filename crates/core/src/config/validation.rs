//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` or `telemetry_base_url` is not an http(s) URL
    /// - `cache_prefix` or `cache_version` is empty
    /// - an entry of `api_patterns` is not a valid regular expression
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `maintenance_interval_secs` or a max age is 0
    /// - a manifest path cannot be resolved against the origin
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;
        self.telemetry_base()?;

        if self.cache_prefix.is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if self.cache_version.is_empty() {
            return Err(invalid("cache_version", "must not be empty"));
        }

        for pattern in &self.api_patterns {
            regex::Regex::new(pattern).map_err(|e| invalid("api_patterns", format!("{pattern}: {e}")))?;
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.maintenance_interval_secs == 0 {
            return Err(invalid("maintenance_interval_secs", "must be at least 1 second"));
        }
        if self.default_max_age_secs == 0 {
            return Err(invalid("default_max_age_secs", "must be greater than 0"));
        }
        if self.api_max_age_secs == 0 {
            return Err(invalid("api_max_age_secs", "must be greater than 0"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        self.manifest_urls()?;

        if !self.precache_manifest.contains(&self.offline_document) {
            tracing::warn!(
                offline_document = %self.offline_document,
                "offline_document is not listed in precache_manifest; \
                 it will be pre-cached anyway"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: AppConfig) -> String {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_origin_scheme() {
        let config = AppConfig { origin: "ftp://clinic.example".into(), ..Default::default() };
        assert_eq!(invalid_field(config), "origin");
    }

    #[test]
    fn test_validate_origin_relative() {
        let config = AppConfig { origin: "clinic.example".into(), ..Default::default() };
        assert_eq!(invalid_field(config), "origin");
    }

    #[test]
    fn test_validate_empty_version() {
        let config = AppConfig { cache_version: String::new(), ..Default::default() };
        assert_eq!(invalid_field(config), "cache_version");
    }

    #[test]
    fn test_validate_bad_api_pattern() {
        let config = AppConfig { api_patterns: vec!["(unclosed".into()], ..Default::default() };
        assert_eq!(invalid_field(config), "api_patterns");
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(invalid_field(config), "timeout_ms");

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(invalid_field(config), "timeout_ms");

        let config = AppConfig { timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = AppConfig { maintenance_interval_secs: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "maintenance_interval_secs");
    }

    #[test]
    fn test_validate_zero_api_max_age() {
        let config = AppConfig { api_max_age_secs: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "api_max_age_secs");
    }

    #[test]
    fn test_validate_offline_document_outside_manifest() {
        let config = AppConfig { precache_manifest: vec!["/".into()], ..Default::default() };
        assert!(config.validate().is_ok());
    }
}

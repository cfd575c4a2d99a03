//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (HARBOR_*)
//! 2. TOML config file (if HARBOR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{ContainerSet, MaxAge};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HARBOR_*)
/// 2. TOML config file (if HARBOR_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site origin; manifest paths and the offline document resolve against it.
    ///
    /// Set via HARBOR_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix of every cache container name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag embedded in container names. Bumping it discards all
    /// previous containers at the next activation.
    ///
    /// Set via HARBOR_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Paths cached unconditionally at install time.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<String>,

    /// Document served when a navigation fails with no cached copy.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Regular expressions matched against the full request URL to select
    /// stale-while-revalidate handling.
    ///
    /// Set via HARBOR_API_PATTERNS environment variable.
    #[serde(default = "default_api_patterns")]
    pub api_patterns: Vec<String>,

    /// Path to the SQLite cache database.
    #[serde(default = "default_cache_db_path")]
    pub cache_db_path: PathBuf,

    /// Path to the SQLite event queue database.
    #[serde(default = "default_queue_db_path")]
    pub queue_db_path: PathBuf,

    /// Base URL of the telemetry ingestion endpoint; defaults to `origin`.
    #[serde(default)]
    pub telemetry_base_url: Option<String>,

    /// User-Agent string for outgoing requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via HARBOR_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Seconds between periodic maintenance runs.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,

    /// Max entry age for static and page containers.
    #[serde(default = "default_max_age_secs")]
    pub default_max_age_secs: u64,

    /// Max entry age for the API container.
    #[serde(default = "default_api_max_age_secs")]
    pub api_max_age_secs: u64,
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_cache_prefix() -> String {
    "clinic".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_precache_manifest() -> Vec<String> {
    vec!["/".into(), "/offline.html".into(), "/manifest.json".into(), "/favicon.ico".into()]
}

fn default_offline_document() -> String {
    "/offline.html".into()
}

fn default_api_patterns() -> Vec<String> {
    vec!["/api/".into(), r"\.supabase\.co/rest/".into()]
}

fn default_cache_db_path() -> PathBuf {
    PathBuf::from("./harbor-cache.sqlite")
}

fn default_queue_db_path() -> PathBuf {
    PathBuf::from("./harbor-queue.sqlite")
}

fn default_user_agent() -> String {
    "harbor/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_maintenance_interval_secs() -> u64 {
    60 * 60
}

fn default_max_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_api_max_age_secs() -> u64 {
    5 * 60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            precache_manifest: default_precache_manifest(),
            offline_document: default_offline_document(),
            api_patterns: default_api_patterns(),
            cache_db_path: default_cache_db_path(),
            queue_db_path: default_queue_db_path(),
            telemetry_base_url: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            default_max_age_secs: default_max_age_secs(),
            api_max_age_secs: default_api_max_age_secs(),
        }
    }
}

fn parse_http_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid { field: field.into(), reason: e.to_string() })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::Invalid { field: field.into(), reason: format!("unsupported scheme: {scheme}") }),
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }

    pub fn max_age(&self) -> MaxAge {
        MaxAge {
            default: Duration::from_secs(self.default_max_age_secs),
            api: Duration::from_secs(self.api_max_age_secs),
        }
    }

    pub fn containers(&self) -> ContainerSet {
        ContainerSet::new(&self.cache_prefix, &self.cache_version)
    }

    /// Parsed site origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        parse_http_url("origin", &self.origin)
    }

    /// Base URL events are posted under; falls back to the origin.
    pub fn telemetry_base(&self) -> Result<Url, ConfigError> {
        match &self.telemetry_base_url {
            Some(raw) => parse_http_url("telemetry_base_url", raw),
            None => self.origin_url(),
        }
    }

    /// Resolve a manifest path against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(path)
            .map_err(|e| ConfigError::Invalid { field: "precache_manifest".into(), reason: format!("{path}: {e}") })
    }

    /// Install manifest as absolute URLs, always including the offline document.
    pub fn manifest_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let mut urls = self
            .precache_manifest
            .iter()
            .map(|path| self.resolve(path))
            .collect::<Result<Vec<_>, _>>()?;
        let offline = self.offline_url()?;
        if !urls.contains(&offline) {
            urls.push(offline);
        }
        Ok(urls)
    }

    pub fn offline_url(&self) -> Result<Url, ConfigError> {
        self.resolve(&self.offline_document)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `HARBOR_`
    /// 2. TOML file from `HARBOR_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("HARBOR_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("HARBOR_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

//! `AppConfig` struct, TOML read/write, and environment overrides.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use cinegate_api::tmdb::{
    DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_CAPACITY, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MIN_INTERVAL, DEFAULT_TTL, Gateway,
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// TMDB gateway settings.
    #[serde(default)]
    pub tmdb: TmdbConfig,
}

/// TMDB gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TmdbConfig {
    /// API keys, in rotation order.
    pub api_keys: Vec<String>,
    /// API base URL.
    pub base_url: String,
    /// Default response language.
    pub language: String,
    /// Cache entry lifetime in seconds.
    pub cache_ttl_secs: u64,
    /// Maximum cached responses.
    pub cache_capacity: usize,
    /// Minimum spacing between upstream requests in milliseconds.
    pub min_interval_ms: u64,
    /// Attempts per fetch.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub backoff_base_ms: u64,
    /// Growth factor between retry delays.
    pub backoff_multiplier: f64,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            base_url: String::from("https://api.themoviedb.org/3/"),
            language: String::from("en-US"),
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            cache_capacity: DEFAULT_CAPACITY,
            min_interval_ms: u64::try_from(DEFAULT_MIN_INTERVAL.as_millis()).unwrap_or(100),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: u64::try_from(DEFAULT_BACKOFF_BASE.as_millis()).unwrap_or(3000),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            timeout_secs: 10,
        }
    }
}

/// Parses an environment value, naming the variable on failure.
fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {name}: {raw:?}"))
}

impl TmdbConfig {
    /// Overrides fields from `TMDB_*` variables returned by `lookup`.
    ///
    /// `TMDB_API_KEYS` is a comma-separated list.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("TMDB_API_KEYS") {
            self.api_keys = raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(raw) = lookup("TMDB_BASE_URL") {
            self.base_url = raw;
        }
        if let Some(raw) = lookup("TMDB_LANGUAGE") {
            self.language = raw;
        }
        if let Some(raw) = lookup("TMDB_CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_env("TMDB_CACHE_TTL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("TMDB_CACHE_CAPACITY") {
            self.cache_capacity = parse_env("TMDB_CACHE_CAPACITY", &raw)?;
        }
        if let Some(raw) = lookup("TMDB_MIN_INTERVAL_MS") {
            self.min_interval_ms = parse_env("TMDB_MIN_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("TMDB_MAX_ATTEMPTS") {
            self.max_attempts = parse_env("TMDB_MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("TMDB_BACKOFF_BASE_MS") {
            self.backoff_base_ms = parse_env("TMDB_BACKOFF_BASE_MS", &raw)?;
        }
        if let Some(raw) = lookup("TMDB_BACKOFF_MULTIPLIER") {
            self.backoff_multiplier = parse_env("TMDB_BACKOFF_MULTIPLIER", &raw)?;
        }
        if let Some(raw) = lookup("TMDB_TIMEOUT_SECS") {
            self.timeout_secs = parse_env("TMDB_TIMEOUT_SECS", &raw)?;
        }
        Ok(())
    }

    /// Builds a [`Gateway`] from these settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the gateway fails to build.
    pub fn build_gateway(&self) -> Result<Gateway> {
        let base_url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid TMDB base URL: {}", self.base_url))?;

        Gateway::builder()
            .base_url(base_url)
            .api_keys(self.api_keys.iter().cloned())
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .language(self.language.clone())
            .timeout(Duration::from_secs(self.timeout_secs))
            .min_interval(Duration::from_millis(self.min_interval_ms))
            .cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .cache_capacity(self.cache_capacity)
            .max_attempts(self.max_attempts)
            .backoff(
                Duration::from_millis(self.backoff_base_ms),
                self.backoff_multiplier,
            )
            .build()
            .context("failed to build TMDB gateway")
    }
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Loads config from `path`, then applies process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or an override is invalid.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.tmdb.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Saves config to a TOML file, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation or file write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config to TOML")?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|&(k, v)| (String::from(k), String::from(v)))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        // Arrange & Act
        let config = AppConfig::default();

        // Assert
        assert!(config.tmdb.api_keys.is_empty());
        assert_eq!(config.tmdb.cache_ttl_secs, 1800);
        assert_eq!(config.tmdb.cache_capacity, 1000);
        assert_eq!(config.tmdb.min_interval_ms, 100);
        assert_eq!(config.tmdb.max_attempts, 6);
        assert_eq!(config.tmdb.backoff_base_ms, 3000);
        assert_eq!(config.tmdb.timeout_secs, 10);
    }

    #[test]
    fn test_env_overrides() {
        // Arrange
        let mut config = TmdbConfig::default();
        let lookup = env_of(&[
            ("TMDB_API_KEYS", " k1 , k2,,k3 "),
            ("TMDB_MAX_ATTEMPTS", "3"),
            ("TMDB_BACKOFF_MULTIPLIER", "2.0"),
            ("TMDB_LANGUAGE", "ja-JP"),
        ]);

        // Act
        config.apply_env(lookup).unwrap();

        // Assert
        assert_eq!(config.api_keys, ["k1", "k2", "k3"]);
        assert_eq!(config.max_attempts, 3);
        assert!((config.backoff_multiplier - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.language, "ja-JP");
        assert_eq!(config.cache_capacity, 1000);
    }

    #[test]
    fn test_invalid_env_names_variable() {
        // Arrange
        let mut config = TmdbConfig::default();
        let lookup = env_of(&[("TMDB_CACHE_CAPACITY", "lots")]);

        // Act
        let result = config.apply_env(lookup);

        // Assert
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("TMDB_CACHE_CAPACITY")
        );
    }

    #[test]
    fn test_build_gateway_reports_keys() {
        // Arrange
        let config = TmdbConfig {
            api_keys: vec![String::from("a"), String::from("b")],
            ..TmdbConfig::default()
        };

        // Act
        let gateway = config.build_gateway().unwrap();

        // Assert
        let status = gateway.status();
        assert_eq!(status.api_keys.total, 2);
        assert_eq!(status.cache.capacity, 1000);
    }

    #[test]
    fn test_build_gateway_rejects_bad_url() {
        // Arrange
        let config = TmdbConfig {
            base_url: String::from("not a url"),
            ..TmdbConfig::default()
        };

        // Act
        let result = config.build_gateway();

        // Assert
        assert!(result.unwrap_err().to_string().contains("invalid TMDB base URL"));
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        // Arrange
        let path = Path::new("/tmp/cinegate_test_nonexistent_config.toml");

        // Act
        let config = AppConfig::load(path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = AppConfig {
            tmdb: TmdbConfig {
                api_keys: vec![String::from("k1")],
                max_attempts: 4,
                ..TmdbConfig::default()
            },
        };

        // Act
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_config() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tmdb]\napi_keys = [\"k1\"]\ncache_capacity = 5\n").unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config.tmdb.api_keys, ["k1"]);
        assert_eq!(config.tmdb.cache_capacity, 5);
        assert_eq!(config.tmdb.max_attempts, 6);
    }

    #[test]
    fn test_load_empty_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }
}

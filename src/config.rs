use crate::constants::{CACHE_TTL_MS, CONFIG_PATH, DEFAULT_API_URL, DEFAULT_CACHE_DIR, DEFAULT_TIMEOUT_SECS};
use crate::error::{EventsError, Result};
use crate::map::ProjectionConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Runtime configuration, read from `config.toml` with environment overrides.
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub map: ProjectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: String,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: DEFAULT_CACHE_DIR.to_string(),
            ttl_seconds: (CACHE_TTL_MS / 1000) as u64,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Config {
    /// Load `config.toml` from the working directory when present, then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_PATH);
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            EventsError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `EVENTS_API_URL`, `EVENTS_API_TIMEOUT_SECS`, `EVENTS_CACHE_DIR`
    /// and `EVENTS_CACHE_TTL_SECS` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("EVENTS_API_URL") {
            self.api.base_url = url;
        }
        if let Some(raw) = lookup("EVENTS_API_TIMEOUT_SECS") {
            self.api.timeout_seconds = parse_secs("EVENTS_API_TIMEOUT_SECS", &raw)?;
        }
        if let Some(dir) = lookup("EVENTS_CACHE_DIR") {
            self.cache.dir = dir;
        }
        if let Some(raw) = lookup("EVENTS_CACHE_TTL_SECS") {
            self.cache.ttl_seconds = parse_secs("EVENTS_CACHE_TTL_SECS", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://")) {
            return Err(EventsError::Config(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if self.api.timeout_seconds == 0 {
            return Err(EventsError::Config("api.timeout_seconds must be positive".to_string()));
        }
        self.map.validate()
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|e| EventsError::Config(format!("{} must be a whole number of seconds: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.api.timeout_seconds, 15);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.map, ProjectionConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            [api]
            base_url = "https://events.example.com"

            [map]
            padding = 0.1
            inset_min = 5.0
            inset_max = 95.0
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://events.example.com");
        assert_eq!(config.api.timeout_seconds, 15);
        assert_eq!(config.map.inset_max, 95.0);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("EVENTS_API_URL", "http://localhost:9000"),
            ("EVENTS_CACHE_TTL_SECS", "60"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.cache.dir, DEFAULT_CACHE_DIR);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_overrides(|k| {
            (k == "EVENTS_API_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(EventsError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.api.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.map.inset_min = 120.0;
        assert!(config.validate().is_err());
    }
}

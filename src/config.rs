//! Runtime configuration loaded from an optional TOML file.
//!
//! Every section has defaults, so an empty file (or none at all) is a valid
//! configuration. `SKYTRADE_API_URL` overrides `api.base_url`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::error::ConfigError;
use crate::fetch::MAX_POINTS_PER_REQUEST;
use crate::hex::{DYNAMIC_RENDERING_THRESHOLD, MAX_FEATURES_PER_LAYER};
use crate::models::{GeoBounds, TabType};

pub const API_URL_ENV: &str = "SKYTRADE_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub viewport: ViewportConfig,
    pub hexgrid: HexGridConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub max_points_per_request: u32,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            max_points_per_request: MAX_POINTS_PER_REQUEST,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub debounce_ms: u64,
    pub initial_bounds: GeoBounds,
    pub initial_zoom: f64,
    pub tab: TabType,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            initial_bounds: GeoBounds::USA,
            initial_zoom: 4.0,
            tab: TabType::Both,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HexGridConfig {
    pub max_features: usize,
    pub sampling_threshold: usize,
    pub cache_capacity: usize,
}

impl Default for HexGridConfig {
    fn default() -> Self {
        Self {
            max_features: MAX_FEATURES_PER_LAYER,
            sampling_threshold: DYNAMIC_RENDERING_THRESHOLD,
            cache_capacity: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub sample_interval_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// File (if any) plus the environment override
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_from_file(path)?
            }
            None => Config::default(),
        };
        config.apply_env_override(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    /// Blank values are ignored
    pub fn apply_env_override(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api.base_url = Some(url);
        }
    }

    pub fn api_base_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .api
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingApiUrl)?;

        Url::parse(raw).map_err(|source| ConfigError::InvalidApiUrl {
            url: raw.to_string(),
            source,
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.viewport.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.performance.sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.max_points_per_request, 500);
        assert_eq!(config.viewport.debounce_ms, 300);
        assert_eq!(config.viewport.initial_zoom, 4.0);
        assert_eq!(config.viewport.initial_bounds, GeoBounds::USA);
        assert_eq!(config.hexgrid.max_features, 2000);
        assert_eq!(config.hexgrid.cache_capacity, 10);
        assert_eq!(config.sample_interval(), Duration::from_secs(1));
        assert!(matches!(config.api_base_url(), Err(ConfigError::MissingApiUrl)));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [api]
            base_url = "https://api.example.com/v1"

            [viewport]
            debounce_ms = 150
            tab = "drone"
            "#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.viewport.debounce_ms, 150);
        assert_eq!(config.viewport.tab, TabType::Drone);
        assert_eq!(config.viewport.initial_zoom, 4.0);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(
            config.api_base_url().unwrap().as_str(),
            "https://api.example.com/v1"
        );
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api\nbase_url = ").unwrap();
        assert!(matches!(
            Config::load_from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load_from_file(dir.path().join("absent.toml")),
            Err(ConfigError::Read(_))
        ));
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.api.base_url = Some("https://file.example.com".to_string());

        config.apply_env_override(Some("  ".to_string()));
        assert_eq!(config.api.base_url.as_deref(), Some("https://file.example.com"));

        config.apply_env_override(Some("https://env.example.com".to_string()));
        assert_eq!(config.api.base_url.as_deref(), Some("https://env.example.com"));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.api.base_url = Some("not a url".to_string());
        assert!(matches!(
            config.api_base_url(),
            Err(ConfigError::InvalidApiUrl { .. })
        ));
    }
}

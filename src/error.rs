//! Error taxonomy for the explorer.
//!
//! Geometry errors are recovered locally by skipping the offending item,
//! fetch errors at the planning-cycle level, configuration errors abort any
//! fetch attempt outright.

use thiserror::Error;

/// Invalid input to the hex indexer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("invalid hex resolution {0} (expected 0..=15)")]
    InvalidResolution(u8),

    #[error("invalid hex cell id '{0}'")]
    InvalidCell(String),
}

/// Failure of a single sub-area fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error! status: {status} ({url})")]
    Status { status: u16, url: String },

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
}

/// Missing or malformed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API URL not configured (set SKYTRADE_API_URL or api.base_url)")]
    MissingApiUrl,

    #[error("invalid API URL '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level library error.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl ExplorerError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ExplorerError::Configuration(_))
    }
}

pub type Result<T, E = ExplorerError> = std::result::Result<T, E>;

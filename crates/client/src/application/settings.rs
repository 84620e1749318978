//! Client settings loaded from environment variables
//!
//! # Environment Variables
//!
//! - `GEOMARKS_GEOCODE_BASE_URL` - Geocoding service root (default: https://geocode.maps.co)
//! - `GEOMARKS_GEOCODE_API_KEY` - API key appended to every request (optional)
//! - `GEOMARKS_GEOCODE_TIMEOUT_MS` - Per-request deadline in ms (default: 8000)
//! - `GEOMARKS_MIN_REQUEST_INTERVAL_MS` - Spacing between suggestion requests (default: 1000)
//! - `GEOMARKS_LATENCY_MS` - Simulated latency of the marker collection (default: 150)
//! - `GEOMARKS_STORAGE_PATH` - Explicit path of the storage file (optional)
//!
//! Missing values use the defaults. Unparseable values also use the defaults, with a
//! warning so a typo does not go unnoticed.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::application::services::{
    SuggestionConfig, DEFAULT_GEOCODE_TIMEOUT_MS, DEFAULT_MIN_REQUEST_INTERVAL_MS,
};
use crate::infrastructure::http::DEFAULT_GEOCODE_BASE_URL;

/// Simulated latency of the marker collection.
pub const DEFAULT_MARKER_LATENCY_MS: u64 = 150;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub geocode_base_url: String,
    pub geocode_api_key: Option<String>,
    pub geocode_timeout: Duration,
    pub min_request_interval: Duration,
    pub marker_latency: Duration,
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            geocode_base_url: DEFAULT_GEOCODE_BASE_URL.to_string(),
            geocode_api_key: None,
            geocode_timeout: Duration::from_millis(DEFAULT_GEOCODE_TIMEOUT_MS),
            min_request_interval: Duration::from_millis(DEFAULT_MIN_REQUEST_INTERVAL_MS),
            marker_latency: Duration::from_millis(DEFAULT_MARKER_LATENCY_MS),
            storage_path: None,
        }
    }
}

impl ClientSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let millis = |key: &str, default: Duration| {
            Duration::from_millis(parse_or(key, text(key), duration_ms(default)))
        };

        Self {
            geocode_base_url: text("GEOMARKS_GEOCODE_BASE_URL")
                .unwrap_or(defaults.geocode_base_url),
            geocode_api_key: text("GEOMARKS_GEOCODE_API_KEY"),
            geocode_timeout: millis("GEOMARKS_GEOCODE_TIMEOUT_MS", defaults.geocode_timeout),
            min_request_interval: millis(
                "GEOMARKS_MIN_REQUEST_INTERVAL_MS",
                defaults.min_request_interval,
            ),
            marker_latency: millis("GEOMARKS_LATENCY_MS", defaults.marker_latency),
            storage_path: text("GEOMARKS_STORAGE_PATH").map(PathBuf::from),
        }
    }

    pub fn suggestion_config(&self) -> SuggestionConfig {
        SuggestionConfig {
            min_interval: self.min_request_interval,
            timeout: self.geocode_timeout,
        }
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Unparseable setting, using default");
            default
        }),
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

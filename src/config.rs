use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geocoding: GeocodingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Per-request timeout applied to every outbound provider call
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub census_url: String,
    pub nominatim_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoding: GeocodingConfig::default(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: "parcel_ingest/0.1".to_string(),
            census_url: "https://geocoding.geo.census.gov/geocoder/locations/onelineaddress"
                .to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path, e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Load `config.toml` if present, otherwise fall back to defaults.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_ten_second_timeout() {
        let config = Config::default();
        assert_eq!(config.geocoding.timeout_seconds, 10);
        assert!(config.geocoding.census_url.starts_with("https://"));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [geocoding]
            timeout_seconds = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.geocoding.timeout_seconds, 5);
        assert_eq!(config.geocoding.user_agent, "parcel_ingest/0.1");
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::location::{Location, LocationSource};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Rennes city centre, used whenever no better position is known.
pub const RENNES_CENTRE: Location = Location { lat: 48.1173, lon: -1.6778 };

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend_url: String,
    pub fallback_location: Location,
    /// Skips geolocation entirely and always reports this position.
    pub fixed_location: Option<Location>,
    /// IP geolocation endpoint answering `{"lat": .., "lon": ..}`.
    pub geolocation_url: Option<String>,
    pub geolocation_timeout_secs: u64,
    pub request_timeout_secs: Option<u64>,
    pub send_history: bool,
    pub suggestions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            fallback_location: RENNES_CENTRE,
            fixed_location: None,
            geolocation_url: None,
            geolocation_timeout_secs: 5,
            request_timeout_secs: None,
            send_history: false,
            suggestions: vec![
                "Prix du gazole à Rennes".to_string(),
                "Station la moins chère près de moi".to_string(),
                "Parkings disponibles au centre-ville".to_string(),
                "État du trafic à Rennes".to_string(),
            ],
        }
    }

    /// Loads the config from the default location, falling back to defaults
    /// when no file exists yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {}: {}", config_path.display(), e))?;
        Ok(config)
    }

    pub fn location_source(&self) -> LocationSource {
        if let Some(fixed) = self.fixed_location {
            LocationSource::Fixed(fixed)
        } else if let Some(url) = &self.geolocation_url {
            LocationSource::Http(url.clone())
        } else {
            LocationSource::Unavailable
        }
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_secs(self.geolocation_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("fuelbot").join("config.json"))
    }
}

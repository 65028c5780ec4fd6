use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::model::Coordinates;

pub const DEFAULT_FORECAST_BASE_URL: &str = "https://api.open-meteo.com";
pub const DEFAULT_GEOCODING_BASE_URL: &str = "https://api.api-ninjas.com";
pub const DEFAULT_TIMEZONE: &str = "auto";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Remote endpoints and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub forecast_base_url: String,
    pub geocoding_base_url: String,
    pub geocoding_api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            forecast_base_url: DEFAULT_FORECAST_BASE_URL.to_string(),
            geocoding_base_url: DEFAULT_GEOCODING_BASE_URL.to_string(),
            geocoding_api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// timezone = "Europe/Berlin"
///
/// [api]
/// geocoding_api_key = "..."
///
/// [location]
/// latitude = 52.52
/// longitude = 13.41
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timezone forwarded to the forecast API; "auto" lets the API pick.
    pub timezone: String,
    pub database_path: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
    pub api: ApiConfig,
    /// Fixed position used when no coordinates are passed explicitly.
    pub location: Option<Coordinates>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            database_path: None,
            settings_path: None,
            api: ApiConfig::default(),
            location: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// SQLite database holding cached weather and saved cities.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join("weather.sqlite3")),
        }
    }

    /// Key-value file holding unit preferences.
    pub fn settings_path(&self) -> Result<PathBuf> {
        match &self.settings_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.config_dir().join("settings.toml")),
        }
    }

    /// Returns the geocoding API key, if present and non-blank.
    pub fn geocoding_api_key(&self) -> Option<&str> {
        self.api
            .geocoding_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn set_geocoding_api_key(&mut self, api_key: String) {
        self.api.geocoding_api_key = Some(api_key);
    }

    pub fn is_geocoding_configured(&self) -> bool {
        self.geocoding_api_key().is_some()
    }
}

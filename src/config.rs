//! Runtime configuration
//!
//! Resolution order: an explicit `--config` path, then `$ETHDIR_CONFIG`,
//! then `config.yaml` in the platform config directory. When none of
//! these exist the built-in defaults apply.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const CONFIG_ENV: &str = "ETHDIR_CONFIG";

pub const DEFAULT_GEOLOCATION_URL: &str = "https://ipapi.co/json/";
pub const DEFAULT_WORLD_ATLAS_URL: &str =
    "https://cdn.jsdelivr.net/npm/world-atlas@2/countries-110m.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding communities/events/opportunities/organizations
    /// JSON files; the bundled datasets are used when unset.
    pub data_dir: Option<PathBuf>,
    pub geolocation_url: String,
    pub world_atlas_url: String,
    pub request_timeout_secs: u64,
    /// Delay before the add-opportunity wizard resets after submission.
    pub wizard_reset_ms: u64,
    /// Radius used for the "nearby" list around the map camera.
    pub near_me_radius_km: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            geolocation_url: DEFAULT_GEOLOCATION_URL.to_string(),
            world_atlas_url: DEFAULT_WORLD_ATLAS_URL.to_string(),
            request_timeout_secs: 10,
            wizard_reset_ms: 2500,
            near_me_radius_km: 500.0,
        }
    }
}

impl Config {
    /// Load configuration, returning it with the file it came from.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(env_path);
            return Ok((Self::load_from_file(&path)?, Some(path)));
        }

        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Ok((Self::load_from_file(&path)?, Some(path)));
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok((Self::default(), None))
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ethdir")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(Error::config("request_timeout_secs must be positive"));
        }
        if !(self.near_me_radius_km > 0.0) {
            return Err(Error::config("near_me_radius_km must be positive"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn wizard_reset_delay(&self) -> Duration {
        Duration::from_millis(self.wizard_reset_ms)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::provider::Provider;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5001";
pub const SERVER_URL_ENV: &str = "BRAIN_SERVER_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            server_url: None,
            provider: None,
            model_name: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// Remember the last provider and model the brain was initialized with.
    pub fn save_last_init(provider: Provider, model_name: Option<&str>) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.provider = Some(provider.as_str().to_string());
        config.model_name = model_name.map(str::to_string);
        config.save()
    }

    /// Resolve the server URL: CLI flag, then environment, then file, then default.
    pub fn server_url(&self, cli_override: Option<&str>) -> String {
        cli_override
            .map(str::to_string)
            .or_else(|| std::env::var(SERVER_URL_ENV).ok().filter(|s| !s.trim().is_empty()))
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    /// Provider from the last successful init, if one was saved and is still known.
    pub fn saved_provider(&self) -> Option<Provider> {
        self.provider.as_deref().and_then(Provider::from_str)
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("brain-system").join("config.json"))
    }
}

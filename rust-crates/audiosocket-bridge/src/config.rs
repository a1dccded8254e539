//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default address the browser userscript posts to
pub const DEFAULT_INGEST_ADDR: &str = "127.0.0.1:5151";

/// Default address consumers connect to (same port as the game plugin)
pub const DEFAULT_BROADCAST_ADDR: &str = "127.0.0.1:5150";

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// HTTP address for producer events
    pub ingest_addr: String,

    /// TCP address for consumers
    pub broadcast_addr: String,

    /// Relay point sound effects
    pub include_sound_effects: bool,

    /// Relay area sound effects
    pub include_area_sounds: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            ingest_addr: DEFAULT_INGEST_ADDR.to_string(),
            broadcast_addr: DEFAULT_BROADCAST_ADDR.to_string(),
            include_sound_effects: true,
            include_area_sounds: true,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_path())
    }

    /// Load configuration from `config_path`, writing defaults there if it is missing
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref().to_path_buf();

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;

            let mut config: BridgeConfig =
                toml::from_str(&contents).context("Failed to parse config file")?;

            config.config_path = config_path;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("audiosocket")
            .join("bridge.toml")
    }
}

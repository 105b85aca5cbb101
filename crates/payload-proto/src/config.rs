use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub receiver: ReceiverConfig,
    #[serde(default)]
    pub payloads: PayloadsConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Endpoint that accepts the raw payload body.
    #[serde(default = "default_receiver_url")]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadsConfig {
    /// Directory or base URL the payload name is appended to.
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
    /// Optional catalog file replacing the built-in list.
    /// Defaults to `$XDG_CONFIG_HOME/payloader/catalog.toml`.
    #[serde(default = "default_catalog_toml")]
    pub catalog_toml: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding `fav.json` and `recent.json`.
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_toast_secs")]
    pub toast_secs: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            url: default_receiver_url(),
        }
    }
}

impl Default for PayloadsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            images_dir: default_images_dir(),
            catalog_toml: default_catalog_toml(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            toast_secs: default_toast_secs(),
        }
    }
}

fn default_receiver_url() -> String {
    "http://127.0.0.1:9090".to_string()
}

fn default_source() -> String {
    "payloads/".to_string()
}

fn default_images_dir() -> String {
    crate::catalog::DEFAULT_IMAGES_DIR.to_string()
}

fn default_catalog_toml() -> PathBuf {
    platform::config_dir().join("catalog.toml")
}

fn default_state_dir() -> PathBuf {
    platform::data_dir()
}

fn default_toast_secs() -> u64 {
    3
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

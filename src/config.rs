use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Client signature sent with every subscription request. Several panels only
/// return the usage header to clients they recognise.
pub const DEFAULT_USER_AGENT: &str =
    "SFM/1.2.19 (macos aarch64 26.2.0; sing-box 1.12.17; language zh-Hans-CN)";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    #[serde(default = "default_name")]
    pub default_name: String,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("subkeeper");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("subscriptions.db").to_string_lossy().to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    5000
}

fn default_name() -> String {
    "Unnamed subscription".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            default_name: default_name(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("subkeeper")
            .join("config.toml")
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.fetch_timeout_ms == 0 {
            return Err(AppError::Config("fetch_timeout_ms must be greater than 0".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(AppError::Config("user_agent must not be empty".to_string()));
        }
        Ok(())
    }
}

//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, request timeout, where the bearer token is persisted and the
//! last username used to log in.
//!
//! Configuration is stored at `~/.config/bangumoe/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "bangumoe";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "BANGUMOE_API_URL";

/// Production API origin.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8081";

/// HTTP request timeout in seconds.
/// Matches the 10s the web client's request layer allowed.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where the bearer token survives between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// OS keychain
    #[default]
    Keyring,
    /// JSON file in the data directory
    File,
    /// Process memory only
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub token_storage: TokenStorage,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            token_storage: TokenStorage::default(),
            last_username: None,
        }
    }
}

impl Config {
    /// Load from disk, then apply the environment override.
    pub fn load() -> Result<Self> {
        Ok(Self::load_file()?.with_env_overrides())
    }

    /// The config file as written, without environment overrides.
    pub fn load_file() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.api_base_url = normalize_base_url(&config.api_base_url);
        Ok(config)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = normalize_base_url(&url);
            }
        }
        self
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Record the last login name in the config file. Only that field
    /// changes; overrides in effect for this run are not written back.
    pub fn remember_username(username: &str) -> Result<()> {
        Self::remember_username_in(&Self::config_path()?, username)
    }

    fn remember_username_in(path: &Path, username: &str) -> Result<()> {
        let mut saved = Self::load_from(path)?;
        saved.last_username = Some(username.to_string());
        saved.save_to(path)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the file-backed token store and log files.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Strip trailing slashes so endpoint paths can be appended directly.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

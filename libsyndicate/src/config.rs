//! Configuration management for Syndicate

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub vault: VaultConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Where the vault secret comes from: inline in the config, or a file
/// holding it (trailing whitespace ignored). Inline wins when both are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    pub secret: Option<String>,
    pub secret_file: Option<String>,
}

impl VaultConfig {
    pub fn resolve_secret(&self) -> Result<String> {
        if let Some(secret) = &self.secret {
            return Ok(secret.clone());
        }

        if let Some(path) = &self.secret_file {
            let expanded = shellexpand::tilde(path).to_string();
            let secret = std::fs::read_to_string(&expanded).map_err(ConfigError::ReadError)?;
            return Ok(secret.trim_end().to_string());
        }

        Err(ConfigError::MissingField("vault.secret".to_string()).into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Upper bound on a single publisher call, in seconds.
    pub timeout_secs: u64,
    /// Optional cap on recorded attempts per (content, platform). Unset
    /// means a prior failure is always eligible for an immediate retry.
    pub max_attempts: Option<u32>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/syndicate/deliveries.db".to_string(),
            },
            vault: VaultConfig {
                secret: None,
                secret_file: Some("~/.config/syndicate/vault.secret".to_string()),
            },
            publish: PublishConfig::default(),
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNDICATE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("syndicate").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("syndicate"))
}

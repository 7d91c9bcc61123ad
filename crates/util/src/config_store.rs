//! YAML-backed application configuration with schema migration.
//!
//! The file lives at `~/.config/skitz/config.yaml` unless `SKITZ_CONFIG_PATH`
//! points elsewhere. A missing file yields defaults (and is written on first
//! load); an unparsable file is logged and replaced by defaults in memory
//! without touching the file on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use skitz_types::config::{AiProviderConfig, AiProviderType, AppConfig, CURRENT_CONFIG_VERSION, ConfigChange, McpServerConfig};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::path_processing::{app_config_dir, expand_tilde, path_from_env_or};

/// Environment variable allowing callers to override the config file path.
pub const CONFIG_PATH_ENV: &str = "SKITZ_CONFIG_PATH";

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Errors surfaced by config store operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

/// Thread-safe holder of the current configuration plus its file location.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Mutex<AppConfig>,
    persist_to_disk: bool,
}

impl ConfigStore {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// Old schema versions are migrated and written back once.
    pub fn load<P: Into<Option<PathBuf>>>(path: P) -> Result<Self, ConfigError> {
        let resolved_path = match path.into() {
            Some(path) => expand_tilde(&path.to_string_lossy()),
            None => default_config_path(),
        };

        let (mut config, source) = read_config(&resolved_path)?;
        let migrated = migrate(&mut config);
        let store = Self {
            path: resolved_path,
            config: Mutex::new(config),
            persist_to_disk: true,
        };

        if migrated || source == ConfigSource::Missing {
            let config = store.snapshot();
            store.save(&config)?;
            info!(path = %store.path.display(), version = config.version, "Wrote configuration file");
        }
        Ok(store)
    }

    /// In-memory store that never writes to disk.
    pub fn ephemeral(config: AppConfig) -> Self {
        Self {
            path: PathBuf::new(),
            config: Mutex::new(config),
            persist_to_disk: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> AppConfig {
        self.config.lock().expect("config lock poisoned").clone()
    }

    /// Apply a change and persist the result. Returns the updated config.
    pub fn apply(&self, change: &ConfigChange) -> Result<AppConfig, ConfigError> {
        let updated = {
            let mut config = self.config.lock().expect("config lock poisoned");
            change.apply(&mut config);
            config.clone()
        };
        debug!(change = %change.describe(), "Applying config change");
        self.save(&updated)?;
        Ok(updated)
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if !self.persist_to_disk {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ConfigSource {
    File,
    Missing,
    Unreadable,
}

pub fn default_config_path() -> PathBuf {
    path_from_env_or(CONFIG_PATH_ENV, || app_config_dir().join(CONFIG_FILE_NAME))
}

fn read_config(path: &Path) -> Result<(AppConfig, ConfigSource), ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<AppConfig>(&content) {
            Ok(config) => Ok((config, ConfigSource::File)),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse config file; using defaults"
                );
                Ok((AppConfig::default(), ConfigSource::Unreadable))
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok((AppConfig::default(), ConfigSource::Missing)),
        Err(error) => Err(ConfigError::Io(error)),
    }
}

/// Bring `config` up to [`CURRENT_CONFIG_VERSION`]. Returns `true` when anything changed.
pub fn migrate(config: &mut AppConfig) -> bool {
    let mut changed = false;

    if config.version < 2 {
        if config.mcp.servers.is_empty() {
            config.mcp.servers.push(McpServerConfig::default_server());
        }
        if let Some(key) = config.ai.openai_api_key.take().filter(|key| !key.trim().is_empty())
            && !config.ai.providers.iter().any(|provider| provider.provider_type == AiProviderType::Openai)
        {
            config.ai.providers.push(AiProviderConfig {
                name: "openai".to_string(),
                provider_type: AiProviderType::Openai,
                api_key: Some(key),
                enabled: true,
                ..AiProviderConfig::default()
            });
            if config.ai.default_provider.is_none() {
                config.ai.default_provider = Some("openai".to_string());
            }
        }
        if config.history.max_items == 0 {
            config.history.max_items = 50;
        }
        debug!(from = config.version, to = CURRENT_CONFIG_VERSION, "Migrated configuration");
        config.version = CURRENT_CONFIG_VERSION;
        changed = true;
    }

    if config.mcp.enabled && config.mcp.servers.is_empty() {
        config.mcp.servers.push(McpServerConfig::default_server());
        changed = true;
    }

    changed
}

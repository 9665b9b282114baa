//! Configuration management for kbtrain.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `kbtrain.toml` file
//! 3. User config `~/.config/kbtrain/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod defaults;

pub use defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    RenderError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Knowledge-base service connection.
    pub service: ServiceConfig,

    /// Registry synchronisation.
    pub sync: SyncConfig,

    /// Training progress reporting.
    pub training: TrainingConfig,

    /// Local snapshot storage.
    pub storage: StorageConfig,

    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./kbtrain.toml` (project local)
    /// 2. `~/.config/kbtrain/config.toml` (user config)
    /// 3. Falls back to defaults
    ///
    /// Environment overrides are applied in every case.
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new("kbtrain.toml").exists() {
            return Self::from_file("kbtrain.toml");
        }

        if let Some(path) = Self::user_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// `~/.config/kbtrain/config.toml`, if a config directory exists.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kbtrain").join("config.toml"))
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup, keyed by env var name.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Service overrides
        if let Some(url) = lookup("KBTRAIN_BASE_URL") {
            self.service.base_url = url;
        }
        if let Some(key) = lookup(API_KEY_ENV) {
            self.service.api_key = Some(key);
        }
        if let Some(agent) = lookup("KBTRAIN_AGENT_ID") {
            self.service.agent_id = Some(agent);
        }

        // Timing overrides
        if let Some(n) = lookup("KBTRAIN_DEBOUNCE_MS").and_then(|v| v.parse().ok()) {
            self.sync.debounce_ms = n;
        }
        if let Some(n) = lookup("KBTRAIN_TICK_MS").and_then(|v| v.parse().ok()) {
            self.training.tick_interval_ms = n;
        }

        // Storage overrides
        if let Some(dir) = lookup("KBTRAIN_DATA_DIR") {
            self.storage.data_dir = dir;
        }

        if let Some(filter) = lookup("KBTRAIN_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Rejects values the orchestrator and coordinator cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.debounce_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync.debounce_ms must be greater than 0".to_string(),
            ));
        }
        if self.training.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "training.tick_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.training.progress_step == 0 {
            return Err(ConfigError::Invalid(
                "training.progress_step must be greater than 0".to_string(),
            ));
        }
        if self.training.progress_ceiling >= 100 {
            return Err(ConfigError::Invalid(
                "training.progress_ceiling must be below 100".to_string(),
            ));
        }
        Ok(())
    }

    /// Render this configuration as TOML. The API key is never written.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        Config::default().to_toml_string().unwrap_or_default()
    }
}

/// Knowledge-base service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the service API.
    pub base_url: String,

    /// API key (can also be set via environment variable).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Agent whose knowledge base is managed. Falls back to the stored
    /// current agent when unset.
    pub agent_id: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None, // Load from env
            agent_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ServiceConfig {
    /// Get API key from config or environment.
    pub fn api_key_or_env(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Debounce window for refreshes after a mutation (milliseconds).
    pub debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// Progress reporting while a training job is pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub tick_interval_ms: u64,
    pub progress_step: u8,
    pub progress_ceiling: u8,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            progress_step: DEFAULT_PROGRESS_STEP,
            progress_ceiling: DEFAULT_PROGRESS_CEILING,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for kbtrain data (default: ".kbtrain").
    pub data_dir: String,

    /// Agents subdirectory name.
    pub agents_dir: String,

    /// Registry snapshot file name.
    pub snapshot_file: String,

    /// Current agent pointer file name.
    pub current_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            agents_dir: DEFAULT_AGENTS_DIR.to_string(),
            snapshot_file: DEFAULT_SNAPSHOT_FILE.to_string(),
            current_file: DEFAULT_CURRENT_FILE.to_string(),
        }
    }
}

impl StorageConfig {
    /// Get the full path to the agents directory.
    pub fn agents_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.agents_dir)
    }

    /// Get the full path to an agent directory.
    pub fn agent_path(&self, agent_id: &str) -> PathBuf {
        self.agents_path().join(agent_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

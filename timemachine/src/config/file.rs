//! INI configuration file

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::settings::{default_cache_directory, StoreConfig};

/// Default log file name inside the log directory.
pub const DEFAULT_LOG_FILE: &str = "timemachine.log";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log directory; `None` logs to stderr only.
    pub directory: Option<PathBuf>,
    /// Log file name inside `directory`.
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_directory().map(|dir| dir.join("logs")),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

/// Contents of a `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub store: StoreConfig,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load configuration from the default path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }
}

/// Path of the default config file (`<platform config dir>/timemachine/config.ini`).
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timemachine")
        .join("config.ini")
}

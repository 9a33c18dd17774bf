use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database file and connection settings
    pub database: DatabaseConfig,
    /// Log output
    pub logging: LoggingConfig,
    /// Message retention
    pub retention: RetentionConfig,
}

/// Database file and connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// App-local database file
    pub path: String,
    /// Engine busy handler in milliseconds. 0 leaves it off, so a locked
    /// database is reported to the caller immediately.
    pub busy_timeout_ms: u64,
    /// `PRAGMA journal_mode` for file databases
    pub journal_mode: String,
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Optional rolling log file
    pub file_path: Option<String>,
    /// "json" or "text"
    pub format: String,
}

/// Message retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Messages older than this are pruned by `clinic-cache prune`
    pub message_max_age_days: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "data/clinic_cache.db".to_string(), busy_timeout_ms: 0, journal_mode: "wal".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), file_path: None, format: "text".to_string() }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { message_max_age_days: 90 }
    }
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 2] = ["text", "json"];
const VALID_JOURNAL_MODES: [&str; 6] = ["delete", "truncate", "persist", "memory", "wal", "off"];

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// defaults, `config/default`, `config/local`, then `CLINIC_CACHE__*` variables.
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("CLINIC_CACHE").prefix_separator("__").separator("__"))
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(CacheError::Config("database.path cannot be empty".to_string()));
        }
        if !VALID_JOURNAL_MODES.contains(&self.database.journal_mode.to_ascii_lowercase().as_str()) {
            return Err(CacheError::Config(format!(
                "Invalid journal mode: {}. Must be one of: {VALID_JOURNAL_MODES:?}",
                self.database.journal_mode
            )));
        }

        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(CacheError::Config(format!(
                "Invalid log level: {}. Must be one of: {VALID_LEVELS:?}",
                self.logging.level
            )));
        }
        if !VALID_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(CacheError::Config(format!(
                "Invalid log format: {}. Must be one of: {VALID_FORMATS:?}",
                self.logging.format
            )));
        }

        if self.retention.message_max_age_days == 0 {
            return Err(CacheError::Config("message_max_age_days must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Database path from `CLINIC_CACHE_DB` or config
    #[must_use]
    pub fn database_path(&self) -> String {
        std::env::var("CLINIC_CACHE_DB").unwrap_or_else(|_| self.database.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.path, "data/clinic_cache.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.retention.message_max_age_days, 90);
    }

    #[test]
    fn test_config_validation() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.retention.message_max_age_days = 0;
        assert!(config.validate().is_err());
    }
}

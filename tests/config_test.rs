//! Unit tests for config.rs module

use clinic_cache::config::{AppConfig, DatabaseConfig, LoggingConfig, RetentionConfig};
use clinic_cache::error::CacheError;

#[test]
fn test_default_database_config() {
    let config = DatabaseConfig::default();

    assert_eq!(config.path, "data/clinic_cache.db");
    assert_eq!(config.busy_timeout_ms, 0);
    assert_eq!(config.journal_mode, "wal");
}

#[test]
fn test_default_logging_config() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, "info");
    assert_eq!(config.file_path, None);
    assert_eq!(config.format, "text");
}

#[test]
fn test_default_retention_config() {
    assert_eq!(RetentionConfig::default().message_max_age_days, 90);
}

#[test]
fn test_default_config_is_valid() {
    assert!(AppConfig::default().validate().is_ok());
}

#[test]
fn test_empty_database_path_rejected() {
    let mut config = AppConfig::default();
    config.database.path = "  ".to_string();

    let err = config.validate().unwrap_err();
    assert!(matches!(err, CacheError::Config(_)));
    assert!(err.to_string().contains("database.path"));
}

#[test]
fn test_busy_timeout_is_optional() {
    let mut config = AppConfig::default();
    config.database.busy_timeout_ms = 0;
    assert!(config.validate().is_ok());

    config.database.busy_timeout_ms = 250;
    assert!(config.validate().is_ok());
}

#[test]
fn test_journal_mode_is_case_insensitive() {
    let mut config = AppConfig::default();
    config.database.journal_mode = "DELETE".to_string();
    assert!(config.validate().is_ok());

    config.database.journal_mode = "fast".to_string();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Invalid journal mode: fast"));
}

#[test]
fn test_invalid_log_level_rejected() {
    let mut config = AppConfig::default();
    config.logging.level = "verbose".to_string();
    assert!(config.validate().unwrap_err().to_string().contains("Invalid log level"));
}

#[test]
fn test_invalid_log_format_rejected() {
    let mut config = AppConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().unwrap_err().to_string().contains("Invalid log format"));
}

#[test]
fn test_zero_retention_rejected() {
    let mut config = AppConfig::default();
    config.retention.message_max_age_days = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_every_log_level_accepted() {
    for level in ["trace", "debug", "info", "warn", "error"] {
        let mut config = AppConfig::default();
        config.logging.level = level.to_string();
        assert!(config.validate().is_ok(), "{level} should be accepted");
    }
}

#[test]
fn test_config_serializes_round_trip() {
    let mut config = AppConfig::default();
    config.logging.file_path = Some("logs/cache.log".to_string());

    let json = serde_json::to_string(&config).expect("serialize");
    let back: AppConfig = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(back.logging.file_path.as_deref(), Some("logs/cache.log"));
    assert_eq!(back.database.path, config.database.path);
}

//! Clinic Cache - offline storage for the mobile client
//!
//! A versioned SQLite store holding the chat-message cache and synced snapshots
//! of remote entities (patients, attachments, auth tokens).
//!
//! # Features
//!
//! - Forward-only, idempotent schema migrations tracked in `user_version`
//! - Field validation before every write
//! - One generic repository per table with upsert, ordered queries and bulk deletes
//! - Soft delete and sync-status bookkeeping for remote entities
//! - Cascading hard delete from patients to their attachments

/// Configuration management
pub mod config;
/// Connection lifecycle
pub mod db;
/// Error types
pub mod error;
/// Index definitions
pub mod indexes;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Schema migrations
pub mod migrations;
/// Data models and structures
pub mod models;
/// Repository pattern for data access
pub mod repository;
/// Database schema definitions
pub mod schema;
/// Input validation
pub mod validation;

// Re-export key components for easier access
pub use db::CacheDatabase;
pub use error::{CacheError, Result, ValidationError};
pub use models::{AttachmentCacheRecord, AuthTokenRecord, DownloadStatus, Message, PatientCacheRecord, SyncStatus};
pub use repository::{CacheRecord, CacheRepository, TableRepository};
pub use validation::{FromRawFields, RawFields};

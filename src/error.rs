//! Error types for the clinic-cache library.
//!
//! Validation failures are raised before any storage access. Engine errors are
//! carried through verbatim so callers can decide on retry and messaging.

use thiserror::Error;

/// A field-level rule violated by a write before it reached the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent from the input
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field that must hold an integer holds something else
    #[error("{0} must be an integer")]
    NotInteger(String),

    /// A field that must be present is explicitly null
    #[error("{0} cannot be null")]
    Null(String),

    /// A field that must hold text holds something else
    #[error("{0} must be a string")]
    NotText(String),

    /// A key field is an empty string
    #[error("{0} cannot be empty")]
    Empty(String),

    /// A timestamp or counter below zero
    #[error("{0} must be a non-negative integer")]
    Negative(String),

    /// A 0/1 flag holding another integer
    #[error("{0} must be 0 or 1")]
    NotFlag(String),

    /// An enum-like text field outside its value set
    #[error("{field} must be one of {allowed:?}, got '{value}'")]
    InvalidChoice {
        /// Offending field
        field: String,
        /// Rejected value
        value: String,
        /// Accepted values
        allowed: &'static [&'static str],
    },
}

impl ValidationError {
    /// Name of the field that failed validation.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField(f)
            | Self::NotInteger(f)
            | Self::Null(f)
            | Self::NotText(f)
            | Self::Empty(f)
            | Self::Negative(f)
            | Self::NotFlag(f)
            | Self::InvalidChoice { field: f, .. } => f,
        }
    }
}

/// Errors that can occur while operating the local cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Input rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Error reported by the embedded engine, unmodified
    #[error("Database error: {0}")]
    Engine(#[from] rusqlite::Error),

    /// The connection has been closed and will not reopen
    #[error("database connection is closed")]
    Closed,

    /// The stored schema is newer than this build understands
    #[error("Unsupported schema downgrade from version {from} to {to}")]
    UnsupportedDowngrade {
        /// Version found in the database file
        from: i64,
        /// Version this build targets
        to: i64,
    },

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// True when the engine rejected a write on a UNIQUE, FOREIGN KEY or NOT NULL constraint.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Engine(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Convenience type alias for Result with `CacheError`
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<config::ConfigError> for CacheError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

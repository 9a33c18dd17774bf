//! Data models for the cached tables
//!
//! Each struct mirrors one table row. Timestamps are epoch milliseconds and
//! 0/1 integer columns surface as `bool`.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A cached chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Primary key
    pub id: String,
    /// Message text, may be empty
    pub content: String,
    /// True when produced by the assistant
    pub is_ai: bool,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Conversation the message belongs to
    pub session_id: String,
}

/// Local belief about whether a cached entity matches its remote source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Consistent with the remote
    #[default]
    Synced,
    /// Local change not yet pushed
    Pending,
    /// Last sync attempt failed
    Error,
}

impl SyncStatus {
    /// Accepted text values
    pub const VALUES: &'static [&'static str] = &["synced", "pending", "error"];

    /// Column representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}

/// Progress of fetching an attachment to the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Not yet requested
    #[default]
    Pending,
    /// Transfer in progress
    Downloading,
    /// Available at `local_path`
    Completed,
    /// Transfer failed
    Failed,
}

impl DownloadStatus {
    /// Accepted text values
    pub const VALUES: &'static [&'static str] = &["pending", "downloading", "completed", "failed"];

    /// Column representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

macro_rules! text_enum_impls {
    ($ty:ident, $field:literal, { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ValidationError::InvalidChoice {
                        field: $field.to_string(),
                        value: other.to_string(),
                        allowed: Self::VALUES,
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value.as_str()?.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum_impls!(SyncStatus, "sync_status", {
    "synced" => Synced,
    "pending" => Pending,
    "error" => Error,
});

text_enum_impls!(DownloadStatus, "download_status", {
    "pending" => Pending,
    "downloading" => Downloading,
    "completed" => Completed,
    "failed" => Failed,
});

/// Cached snapshot of a remote patient record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientCacheRecord {
    /// Primary key
    pub id: String,
    /// Soft-delete flag
    pub active: bool,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds
    pub updated_at: i64,
    /// Display name
    pub full_name: String,
    /// ISO-8601 date
    pub date_of_birth: Option<String>,
    /// Free text
    pub gender: Option<String>,
    /// Contact phone
    pub phone_number: Option<String>,
    /// Epoch milliseconds
    pub last_visit_at: Option<i64>,
    /// Epoch milliseconds
    pub next_appointment_at: Option<i64>,
    /// Listed among recent patients
    pub is_recent: bool,
    /// Has an upcoming appointment
    pub is_upcoming: bool,
    /// Epoch milliseconds
    pub last_synced_at: Option<i64>,
    /// Remote identity, unique when present
    pub supabase_id: Option<String>,
    /// Sync bookkeeping
    pub sync_status: SyncStatus,
    /// Opaque payload
    pub metadata: Option<Vec<u8>>,
}

impl PatientCacheRecord {
    /// A new active record with defaults for everything but the key fields.
    #[must_use]
    pub fn new(id: impl Into<String>, full_name: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            active: true,
            created_at: now,
            updated_at: now,
            full_name: full_name.into(),
            date_of_birth: None,
            gender: None,
            phone_number: None,
            last_visit_at: None,
            next_appointment_at: None,
            is_recent: false,
            is_upcoming: false,
            last_synced_at: None,
            supabase_id: None,
            sync_status: SyncStatus::Synced,
            metadata: None,
        }
    }
}

/// Cached snapshot of a remote attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentCacheRecord {
    /// Primary key
    pub id: String,
    /// Soft-delete flag
    pub active: bool,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds
    pub updated_at: i64,
    /// Original file name
    pub filename: String,
    /// Coarse file type
    pub file_type: String,
    /// MIME type
    pub mime_type: Option<String>,
    /// Size in bytes
    pub file_size_bytes: Option<i64>,
    /// Content checksum
    pub checksum: Option<String>,
    /// Owning patient
    pub patient_id: Option<String>,
    /// Downloaded copy on device
    pub local_path: Option<String>,
    /// Remote location
    pub remote_url: Option<String>,
    /// Download progress
    pub download_status: DownloadStatus,
    /// Epoch milliseconds
    pub last_synced_at: Option<i64>,
    /// Remote identity, unique when present
    pub supabase_id: Option<String>,
    /// Sync bookkeeping
    pub sync_status: SyncStatus,
    /// Opaque payload
    pub metadata: Option<Vec<u8>>,
}

impl AttachmentCacheRecord {
    /// A new active attachment with defaults for optional fields.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        file_type: impl Into<String>,
        patient_id: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            id: id.into(),
            active: true,
            created_at: now,
            updated_at: now,
            filename: filename.into(),
            file_type: file_type.into(),
            mime_type: None,
            file_size_bytes: None,
            checksum: None,
            patient_id,
            local_path: None,
            remote_url: None,
            download_status: DownloadStatus::Pending,
            last_synced_at: None,
            supabase_id: None,
            sync_status: SyncStatus::Synced,
            metadata: None,
        }
    }
}

/// Cached auth token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokenRecord {
    /// Primary key
    pub id: String,
    /// Soft-delete flag
    pub active: bool,
    /// Epoch milliseconds
    pub created_at: i64,
    /// Epoch milliseconds
    pub updated_at: i64,
    /// Owning user
    pub user_id: String,
    /// Token kind
    pub token_type: Option<String>,
    /// Epoch milliseconds
    pub expires_at: i64,
    /// Set once expiry has been observed
    pub is_expired: bool,
    /// Number of refreshes performed
    pub refresh_count: i64,
    /// Epoch milliseconds
    pub last_used_at: Option<i64>,
    /// Issuing device
    pub device_id: Option<String>,
    /// Issuing address
    pub ip_address: Option<String>,
    /// Epoch milliseconds
    pub last_synced_at: Option<i64>,
    /// Sync bookkeeping
    pub sync_status: SyncStatus,
    /// Opaque payload
    pub metadata: Option<Vec<u8>>,
}

impl AuthTokenRecord {
    /// A new active, unexpired token.
    #[must_use]
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, expires_at: i64, now: i64) -> Self {
        Self {
            id: id.into(),
            active: true,
            created_at: now,
            updated_at: now,
            user_id: user_id.into(),
            token_type: None,
            expires_at,
            is_expired: false,
            refresh_count: 0,
            last_used_at: None,
            device_id: None,
            ip_address: None,
            last_synced_at: None,
            sync_status: SyncStatus::Synced,
            metadata: None,
        }
    }
}

/// Row counts per cached table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Stored schema version
    pub schema_version: i64,
    /// Rows in `messages`
    pub messages: usize,
    /// Rows in `patients_cache`
    pub patients: usize,
    /// Rows in `attachments_cache`
    pub attachments: usize,
    /// Rows in `auth_tokens`
    pub auth_tokens: usize,
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

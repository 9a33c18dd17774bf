//! Database schema definitions
//!
//! Table and column names used with rusqlite, plus the `CREATE TABLE` statement
//! for each cached table. Every statement is `IF NOT EXISTS` so that re-running a
//! migration step against an already-upgraded file is a no-op.

/// Chat message cache (schema version 1)
pub mod messages {
    /// Table name
    pub const TABLE: &str = "messages";
    /// Primary key column
    pub const ID: &str = "id";
    /// Message body, may be empty
    pub const CONTENT: &str = "content";
    /// 1 when the message came from the assistant
    pub const IS_AI: &str = "is_ai";
    /// Epoch milliseconds
    pub const TIMESTAMP: &str = "timestamp";
    /// Conversation grouping key
    pub const SESSION_ID: &str = "session_id";

    /// Columns in insert order
    pub const COLUMNS: &[&str] = &[ID, CONTENT, IS_AI, TIMESTAMP, SESSION_ID];

    /// Table DDL
    pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        is_ai INTEGER NOT NULL,
        timestamp INTEGER NOT NULL,
        session_id TEXT NOT NULL
    )";
}

/// Synced patient snapshots (schema version 2)
pub mod patients_cache {
    /// Table name
    pub const TABLE: &str = "patients_cache";
    /// Primary key column
    pub const ID: &str = "id";
    /// Soft-delete flag
    pub const ACTIVE: &str = "active";
    /// Creation time, epoch milliseconds
    pub const CREATED_AT: &str = "created_at";
    /// Last local modification, epoch milliseconds
    pub const UPDATED_AT: &str = "updated_at";
    /// Display name
    pub const FULL_NAME: &str = "full_name";
    /// ISO date of birth
    pub const DATE_OF_BIRTH: &str = "date_of_birth";
    /// Free-text gender
    pub const GENDER: &str = "gender";
    /// Contact phone
    pub const PHONE_NUMBER: &str = "phone_number";
    /// Most recent visit, epoch milliseconds
    pub const LAST_VISIT_AT: &str = "last_visit_at";
    /// Next scheduled appointment, epoch milliseconds
    pub const NEXT_APPOINTMENT_AT: &str = "next_appointment_at";
    /// Listed in the "recent patients" view
    pub const IS_RECENT: &str = "is_recent";
    /// Has an upcoming appointment
    pub const IS_UPCOMING: &str = "is_upcoming";
    /// Last successful sync, epoch milliseconds
    pub const LAST_SYNCED_AT: &str = "last_synced_at";
    /// Remote identity
    pub const SUPABASE_ID: &str = "supabase_id";
    /// synced / pending / error
    pub const SYNC_STATUS: &str = "sync_status";
    /// Opaque payload
    pub const METADATA: &str = "metadata";

    /// Columns in insert order
    pub const COLUMNS: &[&str] = &[
        ID,
        ACTIVE,
        CREATED_AT,
        UPDATED_AT,
        FULL_NAME,
        DATE_OF_BIRTH,
        GENDER,
        PHONE_NUMBER,
        LAST_VISIT_AT,
        NEXT_APPOINTMENT_AT,
        IS_RECENT,
        IS_UPCOMING,
        LAST_SYNCED_AT,
        SUPABASE_ID,
        SYNC_STATUS,
        METADATA,
    ];

    /// Table DDL
    pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS patients_cache (
        id TEXT PRIMARY KEY,
        active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        full_name TEXT NOT NULL,
        date_of_birth TEXT,
        gender TEXT,
        phone_number TEXT,
        last_visit_at INTEGER,
        next_appointment_at INTEGER,
        is_recent INTEGER NOT NULL DEFAULT 0,
        is_upcoming INTEGER NOT NULL DEFAULT 0,
        last_synced_at INTEGER,
        supabase_id TEXT UNIQUE,
        sync_status TEXT NOT NULL DEFAULT 'synced'
            CHECK (sync_status IN ('synced', 'pending', 'error')),
        metadata BLOB
    )";
}

/// Synced attachment snapshots, owned by a patient (schema version 2)
pub mod attachments_cache {
    /// Table name
    pub const TABLE: &str = "attachments_cache";
    /// Primary key column
    pub const ID: &str = "id";
    /// Soft-delete flag
    pub const ACTIVE: &str = "active";
    /// Creation time, epoch milliseconds
    pub const CREATED_AT: &str = "created_at";
    /// Last local modification, epoch milliseconds
    pub const UPDATED_AT: &str = "updated_at";
    /// Original file name
    pub const FILENAME: &str = "filename";
    /// Coarse type (image, pdf, ...)
    pub const FILE_TYPE: &str = "file_type";
    /// MIME type reported by the remote
    pub const MIME_TYPE: &str = "mime_type";
    /// Size in bytes
    pub const FILE_SIZE_BYTES: &str = "file_size_bytes";
    /// Content checksum
    pub const CHECKSUM: &str = "checksum";
    /// Owning patient, cascades on delete
    pub const PATIENT_ID: &str = "patient_id";
    /// Downloaded copy on device
    pub const LOCAL_PATH: &str = "local_path";
    /// Remote location
    pub const REMOTE_URL: &str = "remote_url";
    /// pending / downloading / completed / failed
    pub const DOWNLOAD_STATUS: &str = "download_status";
    /// Last successful sync, epoch milliseconds
    pub const LAST_SYNCED_AT: &str = "last_synced_at";
    /// Remote identity
    pub const SUPABASE_ID: &str = "supabase_id";
    /// synced / pending / error
    pub const SYNC_STATUS: &str = "sync_status";
    /// Opaque payload
    pub const METADATA: &str = "metadata";

    /// Columns in insert order
    pub const COLUMNS: &[&str] = &[
        ID,
        ACTIVE,
        CREATED_AT,
        UPDATED_AT,
        FILENAME,
        FILE_TYPE,
        MIME_TYPE,
        FILE_SIZE_BYTES,
        CHECKSUM,
        PATIENT_ID,
        LOCAL_PATH,
        REMOTE_URL,
        DOWNLOAD_STATUS,
        LAST_SYNCED_AT,
        SUPABASE_ID,
        SYNC_STATUS,
        METADATA,
    ];

    /// Table DDL. Must run after `patients_cache::CREATE_TABLE`.
    pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS attachments_cache (
        id TEXT PRIMARY KEY,
        active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        filename TEXT NOT NULL,
        file_type TEXT NOT NULL,
        mime_type TEXT,
        file_size_bytes INTEGER,
        checksum TEXT,
        patient_id TEXT REFERENCES patients_cache(id) ON DELETE CASCADE,
        local_path TEXT,
        remote_url TEXT,
        download_status TEXT NOT NULL DEFAULT 'pending'
            CHECK (download_status IN ('pending', 'downloading', 'completed', 'failed')),
        last_synced_at INTEGER,
        supabase_id TEXT UNIQUE,
        sync_status TEXT NOT NULL DEFAULT 'synced'
            CHECK (sync_status IN ('synced', 'pending', 'error')),
        metadata BLOB
    )";
}

/// Cached auth tokens (schema version 2)
pub mod auth_tokens {
    /// Table name
    pub const TABLE: &str = "auth_tokens";
    /// Primary key column
    pub const ID: &str = "id";
    /// Soft-delete flag
    pub const ACTIVE: &str = "active";
    /// Creation time, epoch milliseconds
    pub const CREATED_AT: &str = "created_at";
    /// Last local modification, epoch milliseconds
    pub const UPDATED_AT: &str = "updated_at";
    /// Owning user
    pub const USER_ID: &str = "user_id";
    /// access / refresh / ...
    pub const TOKEN_TYPE: &str = "token_type";
    /// Expiry, epoch milliseconds
    pub const EXPIRES_AT: &str = "expires_at";
    /// Set once `expires_at` has passed
    pub const IS_EXPIRED: &str = "is_expired";
    /// Number of refreshes performed
    pub const REFRESH_COUNT: &str = "refresh_count";
    /// Last use, epoch milliseconds
    pub const LAST_USED_AT: &str = "last_used_at";
    /// Issuing device
    pub const DEVICE_ID: &str = "device_id";
    /// Issuing address
    pub const IP_ADDRESS: &str = "ip_address";
    /// Last successful sync, epoch milliseconds
    pub const LAST_SYNCED_AT: &str = "last_synced_at";
    /// synced / pending / error
    pub const SYNC_STATUS: &str = "sync_status";
    /// Opaque payload
    pub const METADATA: &str = "metadata";

    /// Columns in insert order
    pub const COLUMNS: &[&str] = &[
        ID,
        ACTIVE,
        CREATED_AT,
        UPDATED_AT,
        USER_ID,
        TOKEN_TYPE,
        EXPIRES_AT,
        IS_EXPIRED,
        REFRESH_COUNT,
        LAST_USED_AT,
        DEVICE_ID,
        IP_ADDRESS,
        LAST_SYNCED_AT,
        SYNC_STATUS,
        METADATA,
    ];

    /// Table DDL
    pub const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS auth_tokens (
        id TEXT PRIMARY KEY,
        active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        user_id TEXT NOT NULL,
        token_type TEXT,
        expires_at INTEGER NOT NULL,
        is_expired INTEGER NOT NULL DEFAULT 0,
        refresh_count INTEGER NOT NULL DEFAULT 0,
        last_used_at INTEGER,
        device_id TEXT,
        ip_address TEXT,
        last_synced_at INTEGER,
        sync_status TEXT NOT NULL DEFAULT 'synced'
            CHECK (sync_status IN ('synced', 'pending', 'error')),
        metadata BLOB
    )";
}

/// Tables introduced by schema version 2, parents before children.
pub const V2_TABLES: &[(&str, &str)] = &[
    (patients_cache::TABLE, patients_cache::CREATE_TABLE),
    (attachments_cache::TABLE, attachments_cache::CREATE_TABLE),
    (auth_tokens::TABLE, auth_tokens::CREATE_TABLE),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_counts_match_contract() {
        assert_eq!(messages::COLUMNS.len(), 5);
        assert_eq!(patients_cache::COLUMNS.len(), 16);
        assert_eq!(attachments_cache::COLUMNS.len(), 17);
        assert_eq!(auth_tokens::COLUMNS.len(), 15);
    }

    #[test]
    fn parent_table_precedes_child() {
        let names: Vec<&str> = V2_TABLES.iter().map(|(name, _)| *name).collect();
        let parent = names.iter().position(|n| *n == patients_cache::TABLE);
        let child = names.iter().position(|n| *n == attachments_cache::TABLE);
        assert!(parent < child);
    }

    #[test]
    fn every_column_appears_in_ddl() {
        for (columns, ddl) in [
            (messages::COLUMNS, messages::CREATE_TABLE),
            (patients_cache::COLUMNS, patients_cache::CREATE_TABLE),
            (attachments_cache::COLUMNS, attachments_cache::CREATE_TABLE),
            (auth_tokens::COLUMNS, auth_tokens::CREATE_TABLE),
        ] {
            for column in columns {
                assert!(ddl.contains(column), "{column} missing from DDL");
            }
        }
    }
}

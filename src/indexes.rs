//! Per-table index definitions.
//!
//! Partial indexes carry their predicate into the rendered DDL. Queries such as
//! `query_active` rely on the `active = 1` predicate matching exactly.

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;
use crate::schema::{attachments_cache, auth_tokens, messages, patients_cache};

/// A single `CREATE INDEX` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name
    pub name: &'static str,
    /// Indexed table
    pub table: &'static str,
    /// Indexed columns, in order
    pub columns: &'static [&'static str],
    /// `CREATE UNIQUE INDEX`
    pub unique: bool,
    /// `WHERE` predicate for partial indexes
    pub predicate: Option<&'static str>,
}

impl IndexDefinition {
    const fn plain(name: &'static str, table: &'static str, columns: &'static [&'static str]) -> Self {
        Self { name, table, columns, unique: false, predicate: None }
    }

    const fn unique(name: &'static str, table: &'static str, columns: &'static [&'static str]) -> Self {
        Self { name, table, columns, unique: true, predicate: None }
    }

    const fn partial(
        name: &'static str,
        table: &'static str,
        columns: &'static [&'static str],
        predicate: &'static str,
    ) -> Self {
        Self { name, table, columns, unique: false, predicate: Some(predicate) }
    }

    /// Render the idempotent DDL for this index.
    #[must_use]
    pub fn ddl(&self) -> String {
        let mut sql = format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {}({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            self.table,
            self.columns.join(", ")
        );
        if let Some(predicate) = self.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql
    }
}

/// Predicate shared by every `active` partial index.
pub const ACTIVE_PREDICATE: &str = "active = 1";

/// Indexes on `messages`.
pub const MESSAGE_INDEXES: &[IndexDefinition] = &[IndexDefinition::plain(
    "idx_messages_session_timestamp",
    messages::TABLE,
    &[messages::SESSION_ID, messages::TIMESTAMP],
)];

/// Indexes on `patients_cache`.
pub const PATIENT_INDEXES: &[IndexDefinition] = &[
    IndexDefinition::partial(
        "idx_patients_cache_active",
        patients_cache::TABLE,
        &[patients_cache::ACTIVE],
        ACTIVE_PREDICATE,
    ),
    IndexDefinition::unique(
        "idx_patients_cache_supabase_id",
        patients_cache::TABLE,
        &[patients_cache::SUPABASE_ID],
    ),
    IndexDefinition::plain("idx_patients_cache_is_recent", patients_cache::TABLE, &[patients_cache::IS_RECENT]),
    IndexDefinition::plain("idx_patients_cache_is_upcoming", patients_cache::TABLE, &[patients_cache::IS_UPCOMING]),
    IndexDefinition::plain("idx_patients_cache_sync_status", patients_cache::TABLE, &[patients_cache::SYNC_STATUS]),
];

/// Indexes on `attachments_cache`.
pub const ATTACHMENT_INDEXES: &[IndexDefinition] = &[
    IndexDefinition::partial(
        "idx_attachments_cache_active",
        attachments_cache::TABLE,
        &[attachments_cache::ACTIVE],
        ACTIVE_PREDICATE,
    ),
    IndexDefinition::plain(
        "idx_attachments_cache_patient_id",
        attachments_cache::TABLE,
        &[attachments_cache::PATIENT_ID],
    ),
    IndexDefinition::unique(
        "idx_attachments_cache_supabase_id",
        attachments_cache::TABLE,
        &[attachments_cache::SUPABASE_ID],
    ),
    IndexDefinition::plain(
        "idx_attachments_cache_download_status",
        attachments_cache::TABLE,
        &[attachments_cache::DOWNLOAD_STATUS],
    ),
    IndexDefinition::plain(
        "idx_attachments_cache_sync_status",
        attachments_cache::TABLE,
        &[attachments_cache::SYNC_STATUS],
    ),
];

/// Indexes on `auth_tokens`.
pub const AUTH_TOKEN_INDEXES: &[IndexDefinition] = &[
    IndexDefinition::partial("idx_auth_tokens_active", auth_tokens::TABLE, &[auth_tokens::ACTIVE], ACTIVE_PREDICATE),
    IndexDefinition::plain("idx_auth_tokens_user_id", auth_tokens::TABLE, &[auth_tokens::USER_ID]),
    IndexDefinition::plain("idx_auth_tokens_expires_at", auth_tokens::TABLE, &[auth_tokens::EXPIRES_AT]),
    IndexDefinition::plain("idx_auth_tokens_device_id", auth_tokens::TABLE, &[auth_tokens::DEVICE_ID]),
];

/// Every index for a table, or an empty slice for unknown tables.
#[must_use]
pub fn indexes_for(table: &str) -> &'static [IndexDefinition] {
    match table {
        messages::TABLE => MESSAGE_INDEXES,
        patients_cache::TABLE => PATIENT_INDEXES,
        attachments_cache::TABLE => ATTACHMENT_INDEXES,
        auth_tokens::TABLE => AUTH_TOKEN_INDEXES,
        _ => &[],
    }
}

/// Create every index defined for `table`. Existing indexes are left alone.
pub fn create_indexes(conn: &Connection, table: &str) -> Result<()> {
    for index in indexes_for(table) {
        debug!(index = index.name, table, "Creating index");
        conn.execute_batch(&index.ddl())?;
    }
    Ok(())
}

//! Repository pattern for cached tables
//!
//! One generic [`TableRepository`] serves every table through the [`CacheRecord`]
//! description of its row. Each call validates first, then runs exactly one
//! statement against the shared handle. Engine errors are returned unchanged.

use std::marker::PhantomData;
use std::time::Instant;

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use crate::db::CacheDatabase;
use crate::error::Result;
use crate::metrics::record_operation;
use crate::models::{
    AttachmentCacheRecord, AuthTokenRecord, DownloadStatus, Message, PatientCacheRecord, SyncStatus,
};
use crate::schema::{attachments_cache, auth_tokens, messages, patients_cache};
use crate::validation::{FromRawFields, InputValidator, RawFields, Validate};

/// Describes how a record maps onto its table.
pub trait CacheRecord: Validate + FromRawFields + Send + Sync + Sized + 'static {
    /// Table name
    const TABLE: &'static str;
    /// Columns in the order produced by [`Self::to_values`]
    const COLUMNS: &'static [&'static str];
    /// Ordering column, also the age column for `delete_older_than`
    const ORDER_COLUMN: &'static str;

    /// Primary key
    fn id(&self) -> &str;
    /// Build a record from a result row
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    /// Column values in `COLUMNS` order
    fn to_values(&self) -> Vec<Value>;
}

/// Records carrying `active`, `updated_at`, `sync_status` and `last_synced_at`.
pub trait SyncedRecord: CacheRecord {}

/// Records correlated to a remote row through `supabase_id`.
pub trait RemoteRecord: SyncedRecord {}

/// CRUD contract shared by every cached table.
#[async_trait]
pub trait CacheRepository<R: CacheRecord>: Send + Sync {
    /// Upsert by primary key. Returns the rowid of the written row.
    async fn insert(&self, record: &R) -> Result<i64>;

    /// Every row, oldest first.
    async fn query_all(&self) -> Result<Vec<R>>;

    /// Rows where `column = value`, oldest first. Unknown columns and empty
    /// values yield an empty result.
    async fn query_by_key(&self, column: &str, value: Value) -> Result<Vec<R>>;

    /// Remove one row. Returns 0 when absent.
    async fn delete(&self, id: &str) -> Result<usize>;

    /// Remove rows older than `cutoff`. Any cutoff is accepted.
    async fn delete_older_than(&self, cutoff: i64) -> Result<usize>;

    /// Remove every row.
    async fn clear_all(&self) -> Result<usize>;
}

/// Repository for one table, borrowing the shared handle.
#[derive(Debug)]
pub struct TableRepository<'a, R> {
    db: &'a CacheDatabase,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for TableRepository<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for TableRepository<'_, R> {}

/// Chat message repository
pub type MessageRepository<'a> = TableRepository<'a, Message>;
/// Patient cache repository
pub type PatientRepository<'a> = TableRepository<'a, PatientCacheRecord>;
/// Attachment cache repository
pub type AttachmentRepository<'a> = TableRepository<'a, AttachmentCacheRecord>;
/// Auth token repository
pub type AuthTokenRepository<'a> = TableRepository<'a, AuthTokenRecord>;

fn select_sql<R: CacheRecord>(filter: Option<&str>) -> String {
    let mut sql = format!("SELECT {} FROM {}", R::COLUMNS.join(", "), R::TABLE);
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    sql.push_str(&format!(" ORDER BY {} ASC, rowid ASC", R::ORDER_COLUMN));
    sql
}

fn upsert_sql<R: CacheRecord>() -> String {
    let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = R::COLUMNS
        .iter()
        .filter(|c| **c != "id")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    // DO UPDATE keeps the row in place; REPLACE would delete it and fire ON DELETE CASCADE.
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(id) DO UPDATE SET {} RETURNING rowid",
        R::TABLE,
        R::COLUMNS.join(", "),
        placeholders.join(", "),
        updates.join(", ")
    )
}

/// Bookkeeping updates stamp `updated_at` with the caller's clock.
fn check_stamp(now: i64) -> Result<()> {
    Ok(InputValidator::validate_non_negative("updated_at", now)?)
}

fn collect_rows<R: CacheRecord>(conn: &Connection, sql: &str, args: &[Value]) -> Result<Vec<R>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), |row| R::from_row(row))?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

impl<'a, R: CacheRecord> TableRepository<'a, R> {
    /// Bind a repository to an open database.
    #[must_use]
    pub const fn new(db: &'a CacheDatabase) -> Self {
        Self { db, _record: PhantomData }
    }

    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send,
        T: Send,
    {
        let started = Instant::now();
        let result = self.db.with_conn(f).await;
        record_operation(R::TABLE, operation, started.elapsed(), result.is_ok());
        if let Err(e) = &result {
            debug!(table = R::TABLE, operation, error = %e, "Cache operation failed");
        }
        result
    }

    /// Parse loosely typed input, then upsert it.
    pub async fn insert_raw(&self, fields: &RawFields) -> Result<i64> {
        let record = R::parse(fields)?;
        self.insert(&record).await
    }

    /// Look up one row by primary key.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<R>> {
        let id = id.to_string();
        self.run("find_by_id", move |conn| {
            let sql = select_sql::<R>(Some("id = ?1"));
            Ok(conn.query_row(&sql, params![id], |row| R::from_row(row)).optional()?)
        })
        .await
    }

    /// Number of rows in the table.
    pub async fn count(&self) -> Result<usize> {
        self.run("count", |conn| {
            let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", R::TABLE), [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
        .await
    }
}

#[async_trait]
impl<R: CacheRecord> CacheRepository<R> for TableRepository<'_, R> {
    async fn insert(&self, record: &R) -> Result<i64> {
        record.validate()?;
        debug!(table = R::TABLE, id = record.id(), "Upserting record");
        let values = record.to_values();
        self.run("insert", move |conn| {
            let rowid = conn.query_row(&upsert_sql::<R>(), params_from_iter(values.iter()), |row| row.get(0))?;
            Ok(rowid)
        })
        .await
    }

    async fn query_all(&self) -> Result<Vec<R>> {
        self.run("query_all", |conn| collect_rows(conn, &select_sql::<R>(None), &[])).await
    }

    async fn query_by_key(&self, column: &str, value: Value) -> Result<Vec<R>> {
        if !R::COLUMNS.contains(&column) {
            warn!(table = R::TABLE, column, "Ignoring query on unknown column");
            return Ok(Vec::new());
        }
        let empty = match &value {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        };
        if empty {
            return Ok(Vec::new());
        }
        let sql = select_sql::<R>(Some(&format!("{column} = ?1")));
        self.run("query_by_key", move |conn| collect_rows(conn, &sql, &[value])).await
    }

    async fn delete(&self, id: &str) -> Result<usize> {
        let id = id.to_string();
        self.run("delete", move |conn| {
            Ok(conn.execute(&format!("DELETE FROM {} WHERE id = ?1", R::TABLE), params![id])?)
        })
        .await
    }

    async fn delete_older_than(&self, cutoff: i64) -> Result<usize> {
        self.run("delete_older_than", move |conn| {
            Ok(conn.execute(
                &format!("DELETE FROM {} WHERE {} < ?1", R::TABLE, R::ORDER_COLUMN),
                params![cutoff],
            )?)
        })
        .await
    }

    async fn clear_all(&self) -> Result<usize> {
        self.run("clear_all", |conn| Ok(conn.execute(&format!("DELETE FROM {}", R::TABLE), [])?))
            .await
    }
}

impl<R: SyncedRecord> TableRepository<'_, R> {
    /// Soft delete: the row stays, flagged inactive.
    pub async fn deactivate(&self, id: &str, now: i64) -> Result<usize> {
        check_stamp(now)?;
        let id = id.to_string();
        self.run("deactivate", move |conn| {
            Ok(conn.execute(
                &format!("UPDATE {} SET active = 0, updated_at = ?1 WHERE id = ?2", R::TABLE),
                params![now, id],
            )?)
        })
        .await
    }

    /// Rows with `active = 1`, served by the partial index.
    pub async fn query_active(&self) -> Result<Vec<R>> {
        self.run("query_active", |conn| collect_rows(conn, &select_sql::<R>(Some("active = 1")), &[]))
            .await
    }

    /// Rows in a given sync state.
    pub async fn query_by_sync_status(&self, status: SyncStatus) -> Result<Vec<R>> {
        self.query_by_key("sync_status", Value::Text(status.as_str().to_string())).await
    }

    /// Record the outcome of a sync attempt. `last_synced_at` is only moved
    /// forward when the status is `synced`.
    pub async fn mark_sync_status(&self, id: &str, status: SyncStatus, now: i64) -> Result<usize> {
        check_stamp(now)?;
        let id = id.to_string();
        self.run("mark_sync_status", move |conn| {
            let sql = format!(
                "UPDATE {} SET sync_status = ?1, updated_at = ?2, \
                 last_synced_at = CASE WHEN ?1 = 'synced' THEN ?2 ELSE last_synced_at END \
                 WHERE id = ?3",
                R::TABLE
            );
            Ok(conn.execute(&sql, params![status, now, id])?)
        })
        .await
    }
}

impl<R: RemoteRecord> TableRepository<'_, R> {
    /// Look up the local copy of a remote row.
    pub async fn find_by_supabase_id(&self, supabase_id: &str) -> Result<Option<R>> {
        if supabase_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self
            .query_by_key("supabase_id", Value::Text(supabase_id.to_string()))
            .await?
            .into_iter()
            .next())
    }
}

impl MessageRepository<'_> {
    /// A conversation, oldest message first.
    pub async fn query_session(&self, session_id: &str) -> Result<Vec<Message>> {
        self.query_by_key(messages::SESSION_ID, Value::Text(session_id.to_string())).await
    }

    /// Drop messages older than `max_age_days` relative to `now`.
    pub async fn prune(&self, max_age_days: u32, now: i64) -> Result<usize> {
        let cutoff = now.saturating_sub(i64::from(max_age_days) * 86_400_000);
        self.delete_older_than(cutoff).await
    }
}

impl AttachmentRepository<'_> {
    /// Attachments owned by a patient.
    pub async fn query_for_patient(&self, patient_id: &str) -> Result<Vec<AttachmentCacheRecord>> {
        self.query_by_key(attachments_cache::PATIENT_ID, Value::Text(patient_id.to_string())).await
    }

    /// Track download progress, recording the local copy once available.
    pub async fn set_download_status(
        &self,
        id: &str,
        status: DownloadStatus,
        local_path: Option<&str>,
        now: i64,
    ) -> Result<usize> {
        check_stamp(now)?;
        let id = id.to_string();
        let local_path = local_path.map(ToString::to_string);
        self.run("set_download_status", move |conn| {
            Ok(conn.execute(
                "UPDATE attachments_cache SET download_status = ?1, \
                 local_path = COALESCE(?2, local_path), updated_at = ?3 WHERE id = ?4",
                params![status, local_path, now, id],
            )?)
        })
        .await
    }
}

impl AuthTokenRepository<'_> {
    /// Flag every token whose expiry has passed. Returns the number newly expired.
    pub async fn expire_tokens(&self, now: i64) -> Result<usize> {
        check_stamp(now)?;
        self.run("expire_tokens", move |conn| {
            Ok(conn.execute(
                "UPDATE auth_tokens SET is_expired = 1, updated_at = ?1 \
                 WHERE is_expired = 0 AND expires_at <= ?1",
                params![now],
            )?)
        })
        .await
    }

    /// Active tokens for a user, oldest first.
    pub async fn query_for_user(&self, user_id: &str) -> Result<Vec<AuthTokenRecord>> {
        let tokens = self.query_by_key(auth_tokens::USER_ID, Value::Text(user_id.to_string())).await?;
        Ok(tokens.into_iter().filter(|t| t.active).collect())
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn opt_text(value: Option<&String>) -> Value {
    value.map_or(Value::Null, |v| Value::Text(v.clone()))
}

/// Blank identifiers are stored as NULL so UNIQUE only applies to real ones.
fn opt_key(value: Option<&String>) -> Value {
    value.filter(|v| !v.trim().is_empty()).map_or(Value::Null, |v| Value::Text(v.clone()))
}

fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

fn opt_blob(value: Option<&Vec<u8>>) -> Value {
    value.map_or(Value::Null, |v| Value::Blob(v.clone()))
}

impl CacheRecord for Message {
    const TABLE: &'static str = messages::TABLE;
    const COLUMNS: &'static [&'static str] = messages::COLUMNS;
    const ORDER_COLUMN: &'static str = messages::TIMESTAMP;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(messages::ID)?,
            content: row.get(messages::CONTENT)?,
            is_ai: row.get(messages::IS_AI)?,
            timestamp: row.get(messages::TIMESTAMP)?,
            session_id: row.get(messages::SESSION_ID)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.content),
            flag(self.is_ai),
            Value::Integer(self.timestamp),
            text(&self.session_id),
        ]
    }
}

impl CacheRecord for PatientCacheRecord {
    const TABLE: &'static str = patients_cache::TABLE;
    const COLUMNS: &'static [&'static str] = patients_cache::COLUMNS;
    const ORDER_COLUMN: &'static str = patients_cache::UPDATED_AT;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(patients_cache::ID)?,
            active: row.get(patients_cache::ACTIVE)?,
            created_at: row.get(patients_cache::CREATED_AT)?,
            updated_at: row.get(patients_cache::UPDATED_AT)?,
            full_name: row.get(patients_cache::FULL_NAME)?,
            date_of_birth: row.get(patients_cache::DATE_OF_BIRTH)?,
            gender: row.get(patients_cache::GENDER)?,
            phone_number: row.get(patients_cache::PHONE_NUMBER)?,
            last_visit_at: row.get(patients_cache::LAST_VISIT_AT)?,
            next_appointment_at: row.get(patients_cache::NEXT_APPOINTMENT_AT)?,
            is_recent: row.get(patients_cache::IS_RECENT)?,
            is_upcoming: row.get(patients_cache::IS_UPCOMING)?,
            last_synced_at: row.get(patients_cache::LAST_SYNCED_AT)?,
            supabase_id: row.get(patients_cache::SUPABASE_ID)?,
            sync_status: row.get(patients_cache::SYNC_STATUS)?,
            metadata: row.get(patients_cache::METADATA)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            flag(self.active),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
            text(&self.full_name),
            opt_text(self.date_of_birth.as_ref()),
            opt_text(self.gender.as_ref()),
            opt_text(self.phone_number.as_ref()),
            opt_int(self.last_visit_at),
            opt_int(self.next_appointment_at),
            flag(self.is_recent),
            flag(self.is_upcoming),
            opt_int(self.last_synced_at),
            opt_key(self.supabase_id.as_ref()),
            text(self.sync_status.as_str()),
            opt_blob(self.metadata.as_ref()),
        ]
    }
}

impl SyncedRecord for PatientCacheRecord {}
impl RemoteRecord for PatientCacheRecord {}

impl CacheRecord for AttachmentCacheRecord {
    const TABLE: &'static str = attachments_cache::TABLE;
    const COLUMNS: &'static [&'static str] = attachments_cache::COLUMNS;
    const ORDER_COLUMN: &'static str = attachments_cache::UPDATED_AT;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(attachments_cache::ID)?,
            active: row.get(attachments_cache::ACTIVE)?,
            created_at: row.get(attachments_cache::CREATED_AT)?,
            updated_at: row.get(attachments_cache::UPDATED_AT)?,
            filename: row.get(attachments_cache::FILENAME)?,
            file_type: row.get(attachments_cache::FILE_TYPE)?,
            mime_type: row.get(attachments_cache::MIME_TYPE)?,
            file_size_bytes: row.get(attachments_cache::FILE_SIZE_BYTES)?,
            checksum: row.get(attachments_cache::CHECKSUM)?,
            patient_id: row.get(attachments_cache::PATIENT_ID)?,
            local_path: row.get(attachments_cache::LOCAL_PATH)?,
            remote_url: row.get(attachments_cache::REMOTE_URL)?,
            download_status: row.get(attachments_cache::DOWNLOAD_STATUS)?,
            last_synced_at: row.get(attachments_cache::LAST_SYNCED_AT)?,
            supabase_id: row.get(attachments_cache::SUPABASE_ID)?,
            sync_status: row.get(attachments_cache::SYNC_STATUS)?,
            metadata: row.get(attachments_cache::METADATA)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            flag(self.active),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
            text(&self.filename),
            text(&self.file_type),
            opt_text(self.mime_type.as_ref()),
            opt_int(self.file_size_bytes),
            opt_text(self.checksum.as_ref()),
            opt_text(self.patient_id.as_ref()),
            opt_text(self.local_path.as_ref()),
            opt_text(self.remote_url.as_ref()),
            text(self.download_status.as_str()),
            opt_int(self.last_synced_at),
            opt_key(self.supabase_id.as_ref()),
            text(self.sync_status.as_str()),
            opt_blob(self.metadata.as_ref()),
        ]
    }
}

impl SyncedRecord for AttachmentCacheRecord {}
impl RemoteRecord for AttachmentCacheRecord {}

impl CacheRecord for AuthTokenRecord {
    const TABLE: &'static str = auth_tokens::TABLE;
    const COLUMNS: &'static [&'static str] = auth_tokens::COLUMNS;
    const ORDER_COLUMN: &'static str = auth_tokens::UPDATED_AT;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(auth_tokens::ID)?,
            active: row.get(auth_tokens::ACTIVE)?,
            created_at: row.get(auth_tokens::CREATED_AT)?,
            updated_at: row.get(auth_tokens::UPDATED_AT)?,
            user_id: row.get(auth_tokens::USER_ID)?,
            token_type: row.get(auth_tokens::TOKEN_TYPE)?,
            expires_at: row.get(auth_tokens::EXPIRES_AT)?,
            is_expired: row.get(auth_tokens::IS_EXPIRED)?,
            refresh_count: row.get(auth_tokens::REFRESH_COUNT)?,
            last_used_at: row.get(auth_tokens::LAST_USED_AT)?,
            device_id: row.get(auth_tokens::DEVICE_ID)?,
            ip_address: row.get(auth_tokens::IP_ADDRESS)?,
            last_synced_at: row.get(auth_tokens::LAST_SYNCED_AT)?,
            sync_status: row.get(auth_tokens::SYNC_STATUS)?,
            metadata: row.get(auth_tokens::METADATA)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            flag(self.active),
            Value::Integer(self.created_at),
            Value::Integer(self.updated_at),
            text(&self.user_id),
            opt_text(self.token_type.as_ref()),
            Value::Integer(self.expires_at),
            flag(self.is_expired),
            Value::Integer(self.refresh_count),
            opt_int(self.last_used_at),
            opt_text(self.device_id.as_ref()),
            opt_text(self.ip_address.as_ref()),
            opt_int(self.last_synced_at),
            text(self.sync_status.as_str()),
            opt_blob(self.metadata.as_ref()),
        ]
    }
}

impl SyncedRecord for AuthTokenRecord {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_sql_updates_every_non_key_column() {
        let sql = upsert_sql::<Message>();
        assert!(sql.starts_with("INSERT INTO messages (id, content, is_ai, timestamp, session_id)"));
        assert!(sql.contains("ON CONFLICT(id) DO UPDATE SET content = excluded.content"));
        assert!(!sql.contains("id = excluded.id"));
        assert!(sql.ends_with("RETURNING rowid"));
    }

    #[test]
    fn select_sql_orders_by_age_column() {
        let sql = select_sql::<PatientCacheRecord>(Some("active = 1"));
        assert!(sql.ends_with("WHERE active = 1 ORDER BY updated_at ASC, rowid ASC"));
    }

    #[test]
    fn values_follow_column_order() {
        let record = AttachmentCacheRecord::new("a1", "scan.pdf", "pdf", Some("p1".to_string()), 5);
        let values = record.to_values();
        assert_eq!(values.len(), AttachmentCacheRecord::COLUMNS.len());
        let patient_idx = AttachmentCacheRecord::COLUMNS.iter().position(|c| *c == "patient_id");
        assert_eq!(patient_idx.map(|i| &values[i]), Some(&Value::Text("p1".to_string())));
    }
}

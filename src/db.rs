//! Connection lifecycle
//!
//! [`CacheDatabase`] owns the single embedded-engine handle. Opening runs the
//! schema migrations; closing releases the handle for good, and any later call
//! fails with [`CacheError::Closed`] instead of reopening the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{CacheError, Result};
use crate::migrations::{self, MigrationOutcome};
use crate::models::CacheStats;
use crate::repository::{AttachmentRepository, AuthTokenRepository, MessageRepository, PatientRepository};
use crate::schema::{attachments_cache, auth_tokens, messages, patients_cache};

/// Owned handle to the local cache database.
#[derive(Debug)]
pub struct CacheDatabase {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
    outcome: MigrationOutcome,
}

impl CacheDatabase {
    /// Open (or create) the database file at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = DatabaseConfig { path: path.as_ref().display().to_string(), ..DatabaseConfig::default() };
        Self::open_with_config(&config)
    }

    /// Open the file described by `config`, applying its connection settings.
    pub fn open_with_config(config: &DatabaseConfig) -> Result<Self> {
        let path = PathBuf::from(&config.path);
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        // rusqlite installs a 5s busy handler on open; zero clears it.
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", &config.journal_mode, |row| row.get(0))?;
        debug!(journal_mode = %mode, "Journal mode set");

        let mut db = Self::from_connection(conn)?;
        db.path = Some(path);
        info!(path = %config.path, outcome = ?db.outcome, "Cache database opened");
        Ok(db)
    }

    /// A private in-memory database, migrated to the current version.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Adopt a caller-provided handle, e.g. an in-memory connection in tests.
    /// Foreign keys are enabled and pending migrations are applied.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let outcome = migrations::migrate(&conn)?;
        Ok(Self { conn: Mutex::new(Some(conn)), path: None, outcome })
    }

    /// File backing this database, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// What the migration runner did while opening.
    #[must_use]
    pub const fn migration_outcome(&self) -> MigrationOutcome {
        self.outcome
    }

    /// Run `f` against the live handle, or fail if the database is closed.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send,
        T: Send,
    {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(CacheError::Closed)?;
        f(conn)
    }

    /// Release the native handle. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.take() else {
            warn!("Close requested on an already closed cache database");
            return Ok(());
        };
        if let Err((conn, e)) = conn.close() {
            *guard = Some(conn);
            return Err(e.into());
        }
        info!("Cache database closed");
        Ok(())
    }

    /// True once [`Self::close`] has succeeded.
    pub async fn is_closed(&self) -> bool {
        self.conn.lock().await.is_none()
    }

    /// Stored `user_version`.
    pub async fn schema_version(&self) -> Result<i64> {
        self.with_conn(migrations::user_version).await
    }

    /// User tables, alphabetically.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| migrations::object_names(conn, "table")).await
    }

    /// Explicit indexes, alphabetically.
    pub async fn index_names(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| migrations::object_names(conn, "index")).await
    }

    /// Row counts per table.
    pub async fn stats(&self) -> Result<CacheStats> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<usize> {
                let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
                Ok(usize::try_from(n).unwrap_or_default())
            };
            Ok(CacheStats {
                schema_version: migrations::user_version(conn)?,
                messages: count(messages::TABLE)?,
                patients: count(patients_cache::TABLE)?,
                attachments: count(attachments_cache::TABLE)?,
                auth_tokens: count(auth_tokens::TABLE)?,
            })
        })
        .await
    }

    /// `PRAGMA integrity_check`; a healthy file reports `["ok"]`.
    pub async fn integrity_check(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })
        .await
    }

    /// Chat message repository
    #[must_use]
    pub const fn messages(&self) -> MessageRepository<'_> {
        MessageRepository::new(self)
    }

    /// Patient cache repository
    #[must_use]
    pub const fn patients(&self) -> PatientRepository<'_> {
        PatientRepository::new(self)
    }

    /// Attachment cache repository
    #[must_use]
    pub const fn attachments(&self) -> AttachmentRepository<'_> {
        AttachmentRepository::new(self)
    }

    /// Auth token repository
    #[must_use]
    pub const fn auth_tokens(&self) -> AuthTokenRepository<'_> {
        AuthTokenRepository::new(self)
    }
}

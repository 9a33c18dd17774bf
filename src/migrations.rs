//! Schema migrations
//!
//! Versions move forward only:
//!
//! ```text
//! 0 (unversioned) -> 1 (messages) -> 2 (+ patients_cache, attachments_cache, auth_tokens)
//! ```
//!
//! The stored version lives in `PRAGMA user_version`. Every step is built from
//! `IF NOT EXISTS` statements so that repeating it against an upgraded file
//! leaves the schema unchanged. Failures are logged and returned to the caller.

use rusqlite::{Connection, OptionalExtension};
use tracing::{error, info};

use crate::error::{CacheError, Result};
use crate::indexes::create_indexes;
use crate::logging::OperationTimer;
use crate::schema::{messages, V2_TABLES};

/// Schema version this build writes.
pub const DATABASE_VERSION: i64 = 2;

/// What [`migrate`] did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Fresh file, full schema created
    Created {
        /// Version written
        version: i64,
    },
    /// Existing file moved forward
    Upgraded {
        /// Version found
        from: i64,
        /// Version written
        to: i64,
    },
    /// Already at the current version
    UpToDate,
}

/// Stored schema version; 0 when never set.
pub fn user_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn set_user_version(conn: &Connection, version: i64) -> Result<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Whether a table exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Names of user-created schema objects of `kind` ("table" or "index"),
/// excluding SQLite internals and automatic indexes.
pub fn object_names(conn: &Connection, kind: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = ?1 \
         AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let rows = stmt.query_map([kind], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for name in rows {
        names.push(name?);
    }
    Ok(names)
}

/// Stored DDL for a schema object, if it exists.
pub fn object_sql(conn: &Connection, name: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT sql FROM sqlite_master WHERE name = ?1", [name], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()?
        .flatten())
}

fn create_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(messages::CREATE_TABLE)?;
    create_indexes(conn, messages::TABLE)
}

fn create_v2(conn: &Connection) -> Result<()> {
    // Ordered so parents exist before anything references them.
    for (table, ddl) in V2_TABLES {
        conn.execute_batch(ddl)?;
        create_indexes(conn, table)?;
    }
    Ok(())
}

/// Build the schema of a fresh install at `version`.
///
/// Version 1 is the message cache; anything later is reached by applying the
/// upgrade steps on top, so a fresh file and an upgraded file end up identical.
pub fn on_create(conn: &Connection, version: i64) -> Result<()> {
    info!(version, "Creating cache schema");
    create_v1(conn).inspect_err(|e| error!(error = %e, "Schema creation failed"))?;
    if version > 1 {
        on_upgrade(conn, 1, version)?;
    }
    Ok(())
}

/// Move an existing schema from `old_version` to `new_version`.
///
/// Existing tables and their rows are never touched. Running the same step
/// twice is a no-op. Downgrades are rejected.
pub fn on_upgrade(conn: &Connection, old_version: i64, new_version: i64) -> Result<()> {
    if new_version < old_version {
        return Err(CacheError::UnsupportedDowngrade { from: old_version, to: new_version });
    }
    info!(from = old_version, to = new_version, "Upgrading cache schema");

    apply_upgrade(conn, old_version, new_version)
        .inspect_err(|e| error!(from = old_version, to = new_version, error = %e, "Schema upgrade failed"))
}

fn apply_upgrade(conn: &Connection, old_version: i64, new_version: i64) -> Result<()> {
    if old_version < 1 {
        create_v1(conn)?;
    }
    if old_version < 2 && new_version >= 2 {
        create_v2(conn)?;
    }
    Ok(())
}

/// Bring the schema to [`DATABASE_VERSION`] inside one transaction.
///
/// A version-0 file without a `messages` table is treated as a fresh install.
/// A version-0 file that already holds messages predates versioning and is
/// upgraded in place.
pub fn migrate(conn: &Connection) -> Result<MigrationOutcome> {
    migrate_to(conn, DATABASE_VERSION)
}

/// [`migrate`] against an explicit target version.
pub fn migrate_to(conn: &Connection, target: i64) -> Result<MigrationOutcome> {
    let current = user_version(conn)?;
    if current > target {
        error!(stored = current, target, "Cache schema is newer than this build");
        return Err(CacheError::UnsupportedDowngrade { from: current, to: target });
    }
    if current == target {
        return Ok(MigrationOutcome::UpToDate);
    }

    let timer = OperationTimer::new("schema_migration");
    let tx = conn.unchecked_transaction()?;
    let outcome = if current == 0 && !table_exists(&tx, messages::TABLE)? {
        on_create(&tx, target)?;
        MigrationOutcome::Created { version: target }
    } else {
        on_upgrade(&tx, current, target)?;
        MigrationOutcome::Upgraded { from: current, to: target }
    };
    set_user_version(&tx, target)?;
    tx.commit()?;
    timer.finish();

    info!(?outcome, "Cache schema ready");
    Ok(outcome)
}

//! Connection lifecycle and schema migration tests

use clinic_cache::db::CacheDatabase;
use clinic_cache::error::CacheError;
use clinic_cache::indexes::{create_indexes, PATIENT_INDEXES};
use clinic_cache::migrations::{self, object_names, object_sql, on_create, on_upgrade, MigrationOutcome};
use clinic_cache::models::Message;
use clinic_cache::repository::CacheRepository;
use clinic_cache::schema::messages;
use rusqlite::{Connection, ErrorCode};
use std::time::{Duration, Instant};

fn memory_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
    conn.execute_batch("PRAGMA foreign_keys = ON;").expect("Failed to enable foreign keys");
    conn
}

fn schema_counts(conn: &Connection) -> (usize, usize) {
    (
        object_names(conn, "table").expect("tables").len(),
        object_names(conn, "index").expect("indexes").len(),
    )
}

fn message(id: &str, timestamp: i64) -> Message {
    Message {
        id: id.to_string(),
        content: format!("body {id}"),
        is_ai: false,
        timestamp,
        session_id: "s1".to_string(),
    }
}

#[test]
fn test_on_upgrade_is_idempotent() {
    let conn = memory_connection();
    on_create(&conn, 1).expect("Failed to create v1 schema");

    on_upgrade(&conn, 1, 2).expect("First upgrade failed");
    let after_first = schema_counts(&conn);
    on_upgrade(&conn, 1, 2).expect("Second upgrade failed");
    let after_second = schema_counts(&conn);

    assert_eq!(after_first, after_second);
    assert_eq!(after_first.0, 4);
}

#[test]
fn test_upgrade_from_unversioned_creates_v2_tables() {
    let conn = memory_connection();
    on_upgrade(&conn, 0, 2).expect("Upgrade from version 0 failed");

    let tables = object_names(&conn, "table").expect("tables");
    for table in ["patients_cache", "attachments_cache", "auth_tokens"] {
        assert!(tables.iter().any(|t| t == table), "{table} missing after upgrade");
    }
}

#[test]
fn test_upgrade_preserves_existing_messages() {
    let conn = memory_connection();
    on_create(&conn, 1).expect("Failed to create v1 schema");
    conn.execute(
        "INSERT INTO messages (id, content, is_ai, timestamp, session_id) VALUES ('m1', 'hi', 0, 10, 's1')",
        [],
    )
    .expect("Failed to seed message");
    conn.pragma_update(None, "user_version", 1).expect("Failed to set version");

    let outcome = migrations::migrate(&conn).expect("Migration failed");
    assert_eq!(outcome, MigrationOutcome::Upgraded { from: 1, to: 2 });

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0)).expect("count");
    assert_eq!(count, 1);
}

#[test]
fn test_upgrade_failure_is_returned() {
    let conn = memory_connection();
    on_create(&conn, 1).expect("Failed to create v1 schema");
    conn.execute_batch("PRAGMA query_only = ON;").expect("Failed to make read-only");

    let result = on_upgrade(&conn, 1, 2);
    assert!(matches!(result, Err(CacheError::Engine(_))));
}

#[test]
fn test_partial_index_ddl_contains_where() {
    let conn = memory_connection();
    migrations::migrate(&conn).expect("Migration failed");

    let sql = object_sql(&conn, "idx_patients_cache_active").expect("lookup").expect("index exists");
    assert!(sql.contains("WHERE"), "partial index stored without predicate: {sql}");
    assert!(PATIENT_INDEXES[0].ddl().contains("WHERE active = 1"));
}

#[test]
fn test_create_indexes_twice_is_harmless() {
    let conn = memory_connection();
    conn.execute_batch(messages::CREATE_TABLE).expect("table");
    create_indexes(&conn, messages::TABLE).expect("first");
    create_indexes(&conn, messages::TABLE).expect("second");
    assert_eq!(object_names(&conn, "index").expect("indexes"), vec!["idx_messages_session_timestamp"]);
}

#[tokio::test]
async fn test_fresh_database_reaches_current_version() {
    let db = CacheDatabase::open_in_memory().expect("Failed to open database");

    assert_eq!(db.schema_version().await.expect("version"), migrations::DATABASE_VERSION);
    assert_eq!(db.migration_outcome(), MigrationOutcome::Created { version: 2 });
    let tables = db.table_names().await.expect("tables");
    assert_eq!(tables, vec!["attachments_cache", "auth_tokens", "messages", "patients_cache"]);
    assert_eq!(db.index_names().await.expect("indexes").len(), 15);
}

#[tokio::test]
async fn test_file_database_survives_reopen() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("nested").join("cache.db");

    let db = CacheDatabase::open(&path).expect("Failed to create database");
    db.messages().insert(&message("m1", 100)).await.expect("insert");
    db.close().await.expect("close");

    let reopened = CacheDatabase::open(&path).expect("Failed to reopen database");
    assert_eq!(reopened.migration_outcome(), MigrationOutcome::UpToDate);
    assert_eq!(reopened.messages().query_all().await.expect("query"), vec![message("m1", 100)]);
    assert_eq!(reopened.path(), Some(path.as_path()));
}

#[tokio::test]
async fn test_locked_database_fails_without_waiting() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("locked.db");
    let db = CacheDatabase::open(&path).expect("Failed to create database");

    let holder = Connection::open(&path).expect("Failed to open second connection");
    holder.execute_batch("BEGIN EXCLUSIVE;").expect("Failed to take exclusive lock");

    let started = Instant::now();
    let result = db.messages().insert(&message("m1", 1)).await;
    let elapsed = started.elapsed();

    assert!(
        matches!(&result, Err(CacheError::Engine(rusqlite::Error::SqliteFailure(e, _))) if e.code == ErrorCode::DatabaseBusy),
        "unexpected result: {result:?}"
    );
    assert!(elapsed < Duration::from_secs(1), "insert waited {elapsed:?} on a locked database");

    holder.execute_batch("ROLLBACK;").expect("Failed to release lock");
    db.messages().insert(&message("m1", 1)).await.expect("insert after release");
}

#[tokio::test]
async fn test_operations_after_close_fail() {
    let db = CacheDatabase::open_in_memory().expect("Failed to open database");
    db.close().await.expect("close");

    assert!(db.is_closed().await);
    assert!(matches!(db.messages().query_all().await, Err(CacheError::Closed)));
    assert!(matches!(db.messages().insert(&message("m1", 1)).await, Err(CacheError::Closed)));
    assert!(matches!(db.schema_version().await, Err(CacheError::Closed)));

    // A second close does not reopen anything.
    db.close().await.expect("second close");
    assert!(db.is_closed().await);
}

#[tokio::test]
async fn test_caller_provided_connection() {
    let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
    let db = CacheDatabase::from_connection(conn).expect("Failed to adopt connection");

    let fk: i64 = db
        .with_conn(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
        .await
        .expect("pragma");
    assert_eq!(fk, 1);
    assert!(db.path().is_none());
}

#[tokio::test]
async fn test_newer_database_is_refused() {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("future.db");
    {
        let conn = Connection::open(&path).expect("open");
        conn.pragma_update(None, "user_version", 9).expect("version");
    }

    let result = CacheDatabase::open(&path);
    assert!(matches!(result, Err(CacheError::UnsupportedDowngrade { from: 9, to: 2 })));
}

#[tokio::test]
async fn test_stats_and_integrity() {
    let db = CacheDatabase::open_in_memory().expect("Failed to open database");
    db.messages().insert(&message("m1", 1)).await.expect("insert");

    let stats = db.stats().await.expect("stats");
    assert_eq!(stats.schema_version, 2);
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.patients, 0);
    assert_eq!(db.integrity_check().await.expect("check"), vec!["ok"]);
}

use checkin_core::db::migrations::latest_version;
use checkin_core::db::{open_db, open_db_in_memory, DbError, DbLocation};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "checkin_records");
    assert_index_exists(&conn, "idx_checkin_records_date");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkin.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "checkin_records");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unopenable_path_reports_its_location() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("checkin.db");

    match open_db(&path).unwrap_err() {
        DbError::Open { location, .. } => assert_eq!(location, DbLocation::File(path)),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failed_schema_step_names_the_step_and_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conflict.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE VIEW checkin_records AS SELECT 1 AS date;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::Migration { version, step, .. } => {
            assert_eq!(version, 2);
            assert!(step.contains("index"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 0);
}

#[test]
fn unique_constraint_guards_name_date_pairs() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO checkin_records (name, date, evidence_path, recorded_at)
         VALUES ('Alice', '2024-05-01', 'a', '2024-05-01T08:00:00+00:00');",
        [],
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO checkin_records (name, date, evidence_path, recorded_at)
         VALUES ('Alice', '2024-05-01', 'b', '2024-05-01T09:00:00+00:00');",
        [],
    );
    assert!(duplicate.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert_eq!(
        sqlite_master_count(conn, "table", table_name),
        1,
        "table {table_name} does not exist"
    );
}

fn assert_index_exists(conn: &Connection, index_name: &str) {
    assert_eq!(
        sqlite_master_count(conn, "index", index_name),
        1,
        "index {index_name} does not exist"
    );
}

fn sqlite_master_count(conn: &Connection, kind: &str, name: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2;",
        [kind, name],
        |row| row.get(0),
    )
    .unwrap()
}

use log::{Level, Log, Metadata, Record};
use parcel_core::db::migrations::latest_version;
use parcel_core::db::{open_db_in_memory, DbError};
use parcel_core::{
    Parcel, ParcelRepository, RepoError, SqliteParcelStore, PARCEL_STATUS_DELIVERED,
    PARCEL_STATUS_SENT,
};
use rusqlite::Connection;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Mutex;

#[derive(Default)]
struct CapturingLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl CapturingLogger {
    fn entries_at(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(entry_level, _)| *entry_level == level)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.entries
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

fn test_parcel() -> Parcel {
    Parcel::registered(1000, "test", "2024-01-01T00:00:00Z")
}

#[test]
fn add_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let parcel = test_parcel();
    let number = store.add(&parcel).unwrap();
    assert!(number > 0);

    let loaded = store.get(number).unwrap();
    assert_eq!(loaded.number, number);
    assert_eq!(loaded.client, parcel.client);
    assert_eq!(loaded.status, parcel.status);
    assert_eq!(loaded.address, parcel.address);
    assert_eq!(loaded.created_at, parcel.created_at);
}

#[test]
fn add_and_get_roundtrip_preserves_unusual_values() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let parcels = [
        Parcel::registered(0, "", "2024-01-01T00:00:00Z"),
        Parcel::new(
            -5,
            "на складе",
            "Москва, ул. Льва Толстого, 16 📦",
            "2024-02-29T23:59:59+03:00",
        ),
        Parcel::new(i64::MAX, "returned to sender", "line one\nline two 'quoted'", ""),
    ];

    for parcel in parcels {
        let number = store.add(&parcel).unwrap();
        let loaded = store.get(number).unwrap();
        assert_eq!(loaded, Parcel { number, ..parcel });
    }
}

#[test]
fn add_ignores_caller_number() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let mut parcel = test_parcel();
    parcel.number = 42;
    let number = store.add(&parcel).unwrap();

    assert_eq!(number, 1);
    assert!(store.get(42).unwrap_err().is_not_found());
}

#[test]
fn numbers_are_not_reused_after_delete() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let first = store.add(&test_parcel()).unwrap();
    store.delete(first).unwrap();
    let second = store.add(&test_parcel()).unwrap();

    assert!(second > first);
}

#[test]
fn get_missing_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let err = store.get(999).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(999)));
}

#[test]
fn delete_registered_parcel_removes_row() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let number = store.add(&test_parcel()).unwrap();
    store.delete(number).unwrap();

    let err = store.get(number).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == number));
}

#[test]
fn delete_is_silent_noop_once_sent() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let number = store.add(&test_parcel()).unwrap();
    store.set_status(number, PARCEL_STATUS_SENT).unwrap();

    store.delete(number).unwrap();
    let kept = store.get(number).unwrap();
    assert_eq!(kept.status, PARCEL_STATUS_SENT);
}

#[test]
fn delete_missing_parcel_is_not_an_error() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    store.delete(12345).unwrap();
}

#[test]
fn set_address_updates_registered_parcel() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let parcel = test_parcel();
    let number = store.add(&parcel).unwrap();
    store.set_address(number, "new test address").unwrap();

    let loaded = store.get(number).unwrap();
    assert_eq!(loaded.address, "new test address");
    assert_eq!(loaded.status, parcel.status);
    assert_eq!(loaded.client, parcel.client);
    assert_eq!(loaded.created_at, parcel.created_at);
}

#[test]
fn set_address_is_silent_noop_once_delivered() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let number = store.add(&test_parcel()).unwrap();
    store.set_status(number, PARCEL_STATUS_DELIVERED).unwrap();

    store.set_address(number, "too late").unwrap();
    assert_eq!(store.get(number).unwrap().address, "test");
}

#[test]
fn set_status_is_unconditional_and_unvalidated() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let parcel = test_parcel();
    let number = store.add(&parcel).unwrap();

    store.set_status(number, PARCEL_STATUS_DELIVERED).unwrap();
    assert_eq!(store.get(number).unwrap().status, PARCEL_STATUS_DELIVERED);

    store.set_status(number, PARCEL_STATUS_SENT).unwrap();
    assert_eq!(store.get(number).unwrap().status, PARCEL_STATUS_SENT);

    store.set_status(number, "lost in transit").unwrap();
    let loaded = store.get(number).unwrap();
    assert_eq!(loaded.status, "lost in transit");
    assert_eq!(loaded.address, parcel.address);
}

#[test]
fn set_status_on_missing_parcel_is_not_an_error() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    store.set_status(777, PARCEL_STATUS_SENT).unwrap();
    assert!(store.get(777).unwrap_err().is_not_found());
}

#[test]
fn get_by_client_returns_exactly_client_parcels() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let client = 4_242_424;
    let mut inserted = HashMap::new();
    for address in ["first", "second", "third"] {
        let mut parcel = Parcel::registered(client, address, "2024-03-05T10:20:30Z");
        parcel.number = store.add(&parcel).unwrap();
        inserted.insert(parcel.number, parcel);
    }
    store.add(&Parcel::registered(client + 1, "other", "2024-03-05T10:20:30Z")).unwrap();

    let stored = store.get_by_client(client).unwrap();
    assert_eq!(stored.len(), inserted.len());
    for parcel in stored {
        let expected = inserted.get(&parcel.number).unwrap();
        assert_eq!(&parcel, expected);
    }
}

#[test]
fn get_by_client_without_parcels_is_empty() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    store.add(&test_parcel()).unwrap();
    assert!(store.get_by_client(1).unwrap().is_empty());
}

#[test]
fn get_by_client_fails_whole_call_on_bad_row() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE parcel (
            number INTEGER PRIMARY KEY AUTOINCREMENT,
            client INTEGER,
            status TEXT,
            address TEXT,
            created_at TEXT
        );
        INSERT INTO parcel (client, status, address, created_at)
        VALUES (5, 'registered', 'fine', '2024-01-01T00:00:00Z');
        INSERT INTO parcel (client, status, address, created_at)
        VALUES (5, 'registered', NULL, '2024-01-01T00:00:00Z');
        PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();
    let logger = CapturingLogger::default();
    let store = SqliteParcelStore::try_with_logger(&conn, &logger).unwrap();

    let err = store.get_by_client(5).unwrap_err();
    assert!(matches!(err, RepoError::Db(DbError::Sqlite(_))));

    let errors = logger.entries_at(Level::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("event=parcel_get_by_client"));
    assert!(errors[0].contains("phase=scan"));
}

#[test]
fn storage_failure_is_logged_once_and_propagated() {
    let conn = open_db_in_memory().unwrap();
    let logger = CapturingLogger::default();
    let store = SqliteParcelStore::try_with_logger(&conn, &logger).unwrap();

    conn.execute_batch("DROP TABLE parcel;").unwrap();

    let err = store.add(&test_parcel()).unwrap_err();
    assert!(matches!(err, RepoError::Db(DbError::Sqlite(_))));
    assert!(err.source().is_some());
    assert!(err.to_string().contains("no such table"));

    let errors = logger.entries_at(Level::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("event=parcel_add"));
    assert!(errors[0].contains("status=error"));

    let err = store.set_address(1, "x").unwrap_err();
    assert!(!err.is_not_found());
    assert_eq!(logger.entries_at(Level::Error).len(), 2);
}

#[test]
fn not_found_and_guard_mismatch_are_not_logged_as_errors() {
    let conn = open_db_in_memory().unwrap();
    let logger = CapturingLogger::default();
    let store = SqliteParcelStore::try_with_logger(&conn, &logger).unwrap();

    let number = store.add(&test_parcel()).unwrap();
    store.set_status(number, PARCEL_STATUS_SENT).unwrap();
    store.set_address(number, "blocked").unwrap();
    store.delete(number).unwrap();
    assert!(store.get(number + 1).is_err());

    assert!(logger.entries_at(Level::Error).is_empty());
    let debug = logger.entries_at(Level::Debug);
    assert!(debug
        .iter()
        .any(|entry| entry.contains("event=parcel_set_address") && entry.contains("status=skipped")));
    assert!(debug
        .iter()
        .any(|entry| entry.contains("event=parcel_delete") && entry.contains("status=skipped")));
}

#[test]
fn lifecycle_scenario() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteParcelStore::try_new(&conn).unwrap();

    let parcel = Parcel::registered(1000, "test", "2024-01-01T00:00:00Z");
    let number = store.add(&parcel).unwrap();
    assert_eq!(number, 1);

    let loaded = store.get(1).unwrap();
    assert_eq!(
        loaded,
        Parcel {
            number: 1,
            ..parcel.clone()
        }
    );

    store.set_address(1, "new").unwrap();
    assert_eq!(store.get(1).unwrap().address, "new");

    store.set_status(1, PARCEL_STATUS_SENT).unwrap();

    store.set_address(1, "blocked").unwrap();
    assert_eq!(store.get(1).unwrap().address, "new");

    store.delete(1).unwrap();
    let kept = store.get(1).unwrap();
    assert_eq!(kept.status, PARCEL_STATUS_SENT);
    assert_eq!(kept.address, "new");

    let removable = store.add(&parcel).unwrap();
    store.delete(removable).unwrap();
    assert!(store.get(removable).unwrap_err().is_not_found());
}

#[test]
fn store_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteParcelStore::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn store_rejects_connection_without_parcel_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteParcelStore::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("parcel"))
    ));
}

#[test]
fn store_rejects_parcel_table_missing_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE parcel (
            number INTEGER PRIMARY KEY AUTOINCREMENT,
            client INTEGER NOT NULL,
            status TEXT NOT NULL,
            address TEXT NOT NULL
        );
        PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    let result = SqliteParcelStore::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "parcel",
            column: "created_at"
        })
    ));
}

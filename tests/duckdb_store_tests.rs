//! DuckDbStore behavior against a real in-memory DuckDB catalog

use clonerow::duckdb_store::DuckDbStore;
use clonerow::error::CloneRowError;
use clonerow::sql;
use clonerow::store::{DataStore, RowLocator, Value};
use tempfile::TempDir;

fn store_with_users(alias: &str) -> DuckDbStore {
    let mut store =
        DuckDbStore::connect(alias, &format!("ATTACH ':memory:' AS {}", alias)).unwrap();
    store
        .execute("create table users (id integer, name varchar, age integer)", &[])
        .unwrap();
    store
        .execute(
            "insert into users values (?, ?, ?)",
            &[
                Value::Integer(1),
                Value::Text("alice".to_string()),
                Value::Integer(30),
            ],
        )
        .unwrap();
    store
}

#[test]
fn test_fetch_one_returns_typed_row() {
    let mut store = store_with_users("alpha");
    let row = store
        .fetch_one(&sql::select_row("users", "id"), &[Value::Integer(1)])
        .unwrap()
        .unwrap();
    assert_eq!(row.get("id"), Some(&Value::Integer(1)));
    assert_eq!(row.get("name"), Some(&Value::Text("alice".to_string())));
    assert_eq!(row.get("age"), Some(&Value::Integer(30)));
}

#[test]
fn test_fetch_one_missing_row_is_none() {
    let mut store = store_with_users("alpha");
    let row = store
        .fetch_one(&sql::select_row("users", "id"), &[Value::Integer(99)])
        .unwrap();
    assert!(row.is_none());
}

#[test]
fn test_fetch_one_rejects_multiple_matches() {
    let mut store = store_with_users("alpha");
    store
        .execute(
            "insert into users values (?, ?, ?)",
            &[
                Value::Integer(1),
                Value::Text("dupe".to_string()),
                Value::Integer(9),
            ],
        )
        .unwrap();

    let err = store
        .fetch_one(&sql::select_row("users", "id"), &[Value::Integer(1)])
        .unwrap_err();
    assert!(matches!(err, CloneRowError::AmbiguousRow { .. }));
}

#[test]
fn test_export_then_import_round_trips_the_row() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with_users("alpha");
    let locator = RowLocator::new("users", "id", Value::Integer(1));
    let snapshot = dir.path().join("users-id-1-0.backup");

    let exported = store.export_row(&locator, &snapshot).unwrap();
    assert_eq!(exported, 1);

    let before = store
        .fetch_one(&sql::select_row("users", "id"), &[Value::Integer(1)])
        .unwrap()
        .unwrap();

    let deleted = store
        .execute(&sql::delete_row("users", "id"), &[Value::Integer(1)])
        .unwrap();
    assert_eq!(deleted, 1);

    let imported = store.import_row(&snapshot, "users").unwrap();
    assert_eq!(imported, 1);

    let after = store
        .fetch_one(&sql::select_row("users", "id"), &[Value::Integer(1)])
        .unwrap()
        .unwrap();
    assert_eq!(after, before);
}

#[test]
fn test_export_counts_rows_in_snapshot() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with_users("alpha");
    // Locator that matches nothing: snapshot exists but holds zero rows.
    let locator = RowLocator::new("users", "id", Value::Integer(42));
    let snapshot = dir.path().join("users-id-42-0.backup");

    let exported = store.export_row(&locator, &snapshot).unwrap();
    assert_eq!(exported, 0);
}

#[test]
fn test_transaction_rollback_undoes_delete() {
    let mut store = store_with_users("alpha");

    store.begin_transaction().unwrap();
    let deleted = store
        .execute(&sql::delete_row("users", "id"), &[Value::Integer(1)])
        .unwrap();
    assert_eq!(deleted, 1);
    store.rollback().unwrap();

    let row = store
        .fetch_one(&sql::select_row("users", "id"), &[Value::Integer(1)])
        .unwrap();
    assert!(row.is_some());
}

#[test]
fn test_column_metadata_from_information_schema() {
    let mut store = store_with_users("alpha");
    let meta = store.column_metadata("users", "name").unwrap();
    assert!(meta.data_type.to_lowercase().contains("varchar"));
    assert!(meta.nullable);
    assert!(meta.default.is_none());
}

#[test]
fn test_update_affects_reported_count() {
    let mut store = store_with_users("alpha");
    let statement = sql::update_statement("users", &["name".to_string()], "id");
    let affected = store
        .execute(
            &statement,
            &[Value::Text("bob".to_string()), Value::Integer(1)],
        )
        .unwrap();
    assert_eq!(affected, 1);
}

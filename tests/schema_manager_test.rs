use std::fs;

use tempfile::TempDir;

use lumbung::{
    storage::schema::{Column, SchemaManager},
    types::{error::DatabaseError, value::ColumnType},
};

fn user_columns() -> Vec<Column> {
    vec![
        Column::new("username", ColumnType::String),
        Column::new("age", ColumnType::Int32),
        Column::new("verified", ColumnType::Bool),
        Column::new("bio", ColumnType::String).nullable(),
    ]
}

#[test]
fn create_persists_one_json_file_per_schema() {
    let dir = TempDir::new().unwrap();
    let mut manager = SchemaManager::init(dir.path()).unwrap();

    let schema = manager
        .create(user_columns(), vec!["username".to_string()])
        .unwrap()
        .clone();

    let path = dir.path().join(format!("{}.json", schema.id));
    assert!(path.exists());

    let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["id"], schema.id.as_str());
    assert_eq!(raw["hash"], schema.hash.as_str());
    assert_eq!(raw["columns"][0]["name"], "username");
    assert_eq!(raw["columns"][0]["type"], "string");
    assert_eq!(raw["columns"][0]["size"], -1);
    assert_eq!(raw["columns"][0]["nullable"], false);
    assert_eq!(raw["columns"][1]["type"], "int32");
    assert_eq!(raw["columns"][1]["size"], 4);
    assert_eq!(raw["columns"][2]["type"], "bool");
    assert_eq!(raw["columns"][2]["size"], 1);
    assert_eq!(raw["columns"][3]["nullable"], true);
    assert_eq!(raw["primaryKeys"][0], "username");
}

#[test]
fn init_reloads_previously_created_schemas() {
    let dir = TempDir::new().unwrap();

    let created = {
        let mut manager = SchemaManager::init(dir.path()).unwrap();
        manager.create(user_columns(), Vec::new()).unwrap().clone()
    };

    let reloaded = SchemaManager::init(dir.path()).unwrap();
    let found = reloaded.lookup(&created.id).unwrap();

    assert_eq!(*found, created);
    assert_eq!(found.columns.len(), 4);
    assert_eq!(found.columns[1].column_type, ColumnType::Int32);
    assert!(found.columns[3].nullable);
}

#[test]
fn init_skips_files_without_json_extension() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.txt"), b"not a schema").unwrap();

    let manager = SchemaManager::init(dir.path()).unwrap();
    assert!(manager.lookup("anything").is_none());
}

#[test]
fn lookup_of_unknown_id_returns_none() {
    let dir = TempDir::new().unwrap();
    let manager = SchemaManager::init(dir.path()).unwrap();

    assert!(manager.lookup("no-such-schema").is_none());
}

#[test]
fn content_hash_ignores_column_declaration_order() {
    let dir = TempDir::new().unwrap();
    let mut manager = SchemaManager::init(dir.path()).unwrap();

    let forward = manager.create(user_columns(), Vec::new()).unwrap().clone();

    let mut reversed_columns = user_columns();
    reversed_columns.reverse();
    let reversed = manager.create(reversed_columns, Vec::new()).unwrap().clone();

    assert_ne!(forward.id, reversed.id);
    assert_eq!(forward.hash, reversed.hash);
    // declaration order itself is preserved
    assert_eq!(reversed.columns[0].name, "bio");
    assert_eq!(forward.columns[0].name, "username");
}

#[test]
fn content_hash_differs_for_different_columns() {
    let dir = TempDir::new().unwrap();
    let mut manager = SchemaManager::init(dir.path()).unwrap();

    let users = manager.create(user_columns(), Vec::new()).unwrap().clone();
    let other = manager
        .create(vec![Column::new("total", ColumnType::Int32)], Vec::new())
        .unwrap()
        .clone();

    assert_ne!(users.hash, other.hash);
}

#[test]
fn duplicate_column_names_are_rejected() {
    let dir = TempDir::new().unwrap();
    let mut manager = SchemaManager::init(dir.path()).unwrap();

    let columns = vec![
        Column::new("name", ColumnType::String),
        Column::new("name", ColumnType::Int32),
    ];

    assert!(matches!(
        manager.create(columns, Vec::new()),
        Err(DatabaseError::DuplicateColumn { name }) if name == "name"
    ));
}

#[test]
fn primary_key_must_name_a_column() {
    let dir = TempDir::new().unwrap();
    let mut manager = SchemaManager::init(dir.path()).unwrap();

    assert!(matches!(
        manager.create(user_columns(), vec!["missing".to_string()]),
        Err(DatabaseError::NoSuchColumn { name }) if name == "missing"
    ));
}

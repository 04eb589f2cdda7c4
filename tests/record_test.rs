use std::collections::HashMap;

use lumbung::{
    storage::schema::{Column, Schema},
    types::{
        error::DatabaseError,
        record::{Record, Row},
        value::{ColumnType, Value},
    },
};

fn test_schema() -> Schema {
    Schema {
        id: "schema-under-test".to_string(),
        hash: String::new(),
        columns: vec![
            Column::new("title", ColumnType::String),
            Column::new("count", ColumnType::Int32),
            Column::new("active", ColumnType::Bool),
        ],
        primary_keys: Vec::new(),
    }
}

fn sample_row() -> Row {
    HashMap::from([
        ("title".to_string(), Value::Text("hello world".to_string())),
        ("count".to_string(), Value::Int32(199)),
        ("active".to_string(), Value::Bool(true)),
    ])
}

#[test]
fn from_map_encodes_fields_in_schema_order() {
    let record = Record::from_map(&test_schema(), &sample_row()).unwrap();

    assert_eq!(record.fields.len(), 3);
    assert_eq!(record.fields[0].column.name, "title");
    assert_eq!(record.fields[0].value, b"hello world");
    assert_eq!(record.fields[1].column.name, "count");
    assert_eq!(record.fields[1].value, vec![0, 0, 0, 199]);
    assert_eq!(record.fields[2].column.name, "active");
    assert_eq!(record.fields[2].value, vec![1]);
}

#[test]
fn serialized_layout_prefixes_variable_width_fields() {
    let record = Record::from_map(&test_schema(), &sample_row()).unwrap();
    let bytes = record.serialize();

    // 2-byte length prefix + 11 string bytes + 4 int bytes + 1 bool byte
    assert_eq!(bytes.len(), 18);
    assert_eq!(&bytes[0..2], &[0, 11]);
    assert_eq!(&bytes[2..13], b"hello world");
    assert_eq!(&bytes[13..17], &[0, 0, 0, 199]);
    assert_eq!(bytes[17], 1);
}

#[test]
fn roundtrip_restores_the_original_row() {
    let schema = test_schema();
    let row = sample_row();

    let record = Record::from_map(&schema, &row).unwrap();
    let reloaded = Record::deserialize(&schema, &record.serialize()).unwrap();

    assert_eq!(reloaded, record);
    assert_eq!(reloaded.to_map().unwrap(), row);
}

#[test]
fn negative_int32_roundtrips_through_big_endian() {
    let schema = test_schema();
    let mut row = sample_row();
    row.insert("count".to_string(), Value::Int32(-123));

    let record = Record::from_map(&schema, &row).unwrap();
    assert_eq!(record.fields[1].value, (-123i32).to_be_bytes());

    let reloaded = Record::deserialize(&schema, &record.serialize()).unwrap();
    assert_eq!(reloaded.get_i32("count").unwrap(), -123);
}

#[test]
fn unknown_input_key_is_rejected() {
    let mut row = sample_row();
    row.insert("rating".to_string(), Value::Int32(5));

    assert!(matches!(
        Record::from_map(&test_schema(), &row),
        Err(DatabaseError::NoSuchColumn { name }) if name == "rating"
    ));
}

#[test]
fn missing_schema_column_is_rejected() {
    let mut row = sample_row();
    row.remove("active");

    assert!(matches!(
        Record::from_map(&test_schema(), &row),
        Err(DatabaseError::FieldMissing { name }) if name == "active"
    ));
}

#[test]
fn wrong_value_type_fails_serialization() {
    let mut row = sample_row();
    row.insert("active".to_string(), Value::Int32(8989));

    assert!(matches!(
        Record::from_map(&test_schema(), &row),
        Err(DatabaseError::SerializeFailed {
            column_type: ColumnType::Bool
        })
    ));
}

#[test]
fn typed_accessors_return_declared_types() {
    let record = Record::from_map(&test_schema(), &sample_row()).unwrap();

    assert_eq!(record.get_string("title").unwrap(), "hello world");
    assert_eq!(record.get_i32("count").unwrap(), 199);
    assert!(record.get_bool("active").unwrap());
}

#[test]
fn accessor_on_missing_column_fails() {
    let record = Record::from_map(&test_schema(), &sample_row()).unwrap();

    assert!(matches!(
        record.get_i32("rating"),
        Err(DatabaseError::NoSuchColumn { name }) if name == "rating"
    ));
}

#[test]
fn accessor_with_wrong_type_fails() {
    let record = Record::from_map(&test_schema(), &sample_row()).unwrap();

    assert!(matches!(
        record.get_i32("title"),
        Err(DatabaseError::TypeMismatch {
            expected: ColumnType::Int32,
            actual: ColumnType::String
        })
    ));
}

#[test]
fn string_of_max_prefix_length_is_representable() {
    let schema = test_schema();
    let mut row = sample_row();
    row.insert("title".to_string(), Value::Text("x".repeat(65535)));

    let record = Record::from_map(&schema, &row).unwrap();
    let bytes = record.serialize();
    assert_eq!(&bytes[0..2], &[0xff, 0xff]);

    let reloaded = Record::deserialize(&schema, &bytes).unwrap();
    assert_eq!(reloaded.get_string("title").unwrap().len(), 65535);
}

#[test]
fn string_longer_than_prefix_capacity_is_rejected() {
    let mut row = sample_row();
    row.insert("title".to_string(), Value::Text("x".repeat(65536)));

    assert!(matches!(
        Record::from_map(&test_schema(), &row),
        Err(DatabaseError::SerializeFailed {
            column_type: ColumnType::String
        })
    ));
}

#[test]
fn truncated_data_is_reported_not_panicked() {
    let schema = test_schema();
    let record = Record::from_map(&schema, &sample_row()).unwrap();
    let bytes = record.serialize();

    assert!(matches!(
        Record::deserialize(&schema, &bytes[..bytes.len() - 3]),
        Err(DatabaseError::CorruptedRecord { .. })
    ));
}

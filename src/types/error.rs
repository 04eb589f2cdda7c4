use thiserror::Error;

use crate::types::value::ColumnType;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("table '{name}' already exists")]
    TableExists { name: String },

    #[error("table '{name}' does not exist")]
    TableUnknown { name: String },

    #[error("schema '{id}' is not registered")]
    SchemaUnknown { id: String },

    #[error("no column with name '{name}' in schema")]
    NoSuchColumn { name: String },

    #[error("field '{name}' not provided")]
    FieldMissing { name: String },

    #[error("duplicate column '{name}' in schema")]
    DuplicateColumn { name: String },

    #[error("unique constraint violation on columns: {columns:?}")]
    UniqueViolation { columns: Vec<String> },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: ColumnType,
        actual: ColumnType,
    },

    #[error("failed to serialize {column_type} value")]
    SerializeFailed { column_type: ColumnType },

    #[error("record not found")]
    RecordNotFound,

    #[error("page is full: {required} bytes required, {available} available")]
    PageFull { required: usize, available: usize },

    #[error("invalid page size: expected {expected} bytes, got {actual}")]
    BadPageSize { expected: usize, actual: usize },

    #[error("corrupted page: {reason}")]
    CorruptedPage { reason: String },

    #[error("corrupted record: {reason}")]
    CorruptedRecord { reason: String },
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

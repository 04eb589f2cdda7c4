use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::error::{DatabaseError, Result};

/// Length in bytes of the size prefix carried by variable-width values in
/// their serialized form.
pub const DYNAMIC_VALUE_PREFIX_SIZE: usize = 2;

/// Declared size of a variable-width column.
pub const DYNAMIC_COLUMN_SIZE: i32 = -1;

const FALSE_BYTE: u8 = 0;
const TRUE_BYTE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Int32,
    Bool,
}

impl ColumnType {
    /// Declared on-disk size in bytes, [`DYNAMIC_COLUMN_SIZE`] for
    /// variable-width types.
    pub fn declared_size(&self) -> i32 {
        match self {
            ColumnType::String => DYNAMIC_COLUMN_SIZE,
            ColumnType::Int32 => 4,
            ColumnType::Bool => 1,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::String => write!(f, "string"),
            ColumnType::Int32 => write!(f, "int32"),
            ColumnType::Bool => write!(f, "bool"),
        }
    }
}

/// A typed row value as handed to and returned from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int32(i32),
    Bool(bool),
}

impl Value {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Text(_) => ColumnType::String,
            Value::Int32(_) => ColumnType::Int32,
            Value::Bool(_) => ColumnType::Bool,
        }
    }

    /// Raw encoding without any length prefix; the record codec owns
    /// prefixes for variable-width columns.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Value::Text(s) => {
                // the on-disk length prefix is a u16
                if s.len() > u16::MAX as usize {
                    return Err(DatabaseError::SerializeFailed {
                        column_type: ColumnType::String,
                    });
                }
                Ok(s.as_bytes().to_vec())
            }
            Value::Int32(i) => Ok(i.to_be_bytes().to_vec()),
            Value::Bool(b) => Ok(vec![if *b { TRUE_BYTE } else { FALSE_BYTE }]),
        }
    }

    pub fn decode(column_type: ColumnType, raw: &[u8]) -> Result<Value> {
        match column_type {
            ColumnType::String => {
                let text = std::str::from_utf8(raw).map_err(|err| DatabaseError::CorruptedRecord {
                    reason: format!("invalid utf-8 in string value: {err}"),
                })?;
                Ok(Value::Text(text.to_string()))
            }
            ColumnType::Int32 => {
                let bytes: [u8; 4] =
                    raw.try_into()
                        .map_err(|_| DatabaseError::CorruptedRecord {
                            reason: format!("int32 value has length {}", raw.len()),
                        })?;
                Ok(Value::Int32(i32::from_be_bytes(bytes)))
            }
            ColumnType::Bool => {
                if raw.len() != 1 {
                    return Err(DatabaseError::CorruptedRecord {
                        reason: format!("bool value has length {}", raw.len()),
                    });
                }
                Ok(Value::Bool(raw[0] == TRUE_BYTE))
            }
        }
    }
}

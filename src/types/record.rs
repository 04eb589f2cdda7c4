use std::collections::HashMap;

use crate::{
    storage::schema::{Column, Schema},
    types::{
        error::{DatabaseError, Result},
        value::{ColumnType, Value, DYNAMIC_COLUMN_SIZE, DYNAMIC_VALUE_PREFIX_SIZE},
    },
};

/// The name→value mapping handed to predicate and update callbacks.
pub type Row = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub column: Column,
    /// Raw encoding without the dynamic length prefix; the prefix is
    /// emitted and consumed by the record codec.
    pub value: Vec<u8>,
}

/// A typed tuple in schema column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub fields: Vec<Field>,
}

impl Record {
    /// Build a record from raw caller input, validated against the schema.
    pub fn from_map(schema: &Schema, row: &Row) -> Result<Record> {
        for name in row.keys() {
            if schema.column(name).is_none() {
                return Err(DatabaseError::NoSuchColumn { name: name.clone() });
            }
        }

        let mut fields = Vec::with_capacity(schema.columns.len());
        for column in &schema.columns {
            let value = row
                .get(&column.name)
                .ok_or_else(|| DatabaseError::FieldMissing {
                    name: column.name.clone(),
                })?;

            if value.column_type() != column.column_type {
                return Err(DatabaseError::SerializeFailed {
                    column_type: column.column_type,
                });
            }

            fields.push(Field {
                column: column.clone(),
                value: value.encode()?,
            });
        }

        Ok(Record { fields })
    }

    /// Decode a serialized record laid out in schema column order.
    pub fn deserialize(schema: &Schema, data: &[u8]) -> Result<Record> {
        let mut fields = Vec::with_capacity(schema.columns.len());
        let mut offset = 0usize;

        for column in &schema.columns {
            let size = if column.size == DYNAMIC_COLUMN_SIZE {
                let prefix = data
                    .get(offset..offset + DYNAMIC_VALUE_PREFIX_SIZE)
                    .ok_or_else(|| truncated(column))?;
                offset += DYNAMIC_VALUE_PREFIX_SIZE;
                u16::from_be_bytes([prefix[0], prefix[1]]) as usize
            } else {
                column.size as usize
            };

            let value = data.get(offset..offset + size).ok_or_else(|| truncated(column))?;
            offset += size;

            fields.push(Field {
                column: column.clone(),
                value: value.to_vec(),
            });
        }

        Ok(Record { fields })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let serialized_len: usize = self
            .fields
            .iter()
            .map(|field| {
                if field.column.size == DYNAMIC_COLUMN_SIZE {
                    field.value.len() + DYNAMIC_VALUE_PREFIX_SIZE
                } else {
                    field.value.len()
                }
            })
            .sum();

        let mut serialized = Vec::with_capacity(serialized_len);
        for field in &self.fields {
            if field.column.size == DYNAMIC_COLUMN_SIZE {
                serialized.extend_from_slice(&(field.value.len() as u16).to_be_bytes());
            }
            serialized.extend_from_slice(&field.value);
        }

        serialized
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.column.name == name)
    }

    pub fn get_i32(&self, name: &str) -> Result<i32> {
        match self.decode_field(name)? {
            Value::Int32(value) => Ok(value),
            other => Err(DatabaseError::TypeMismatch {
                expected: ColumnType::Int32,
                actual: other.column_type(),
            }),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<String> {
        match self.decode_field(name)? {
            Value::Text(value) => Ok(value),
            other => Err(DatabaseError::TypeMismatch {
                expected: ColumnType::String,
                actual: other.column_type(),
            }),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.decode_field(name)? {
            Value::Bool(value) => Ok(value),
            other => Err(DatabaseError::TypeMismatch {
                expected: ColumnType::Bool,
                actual: other.column_type(),
            }),
        }
    }

    /// Materialize into the name→value mapping used by predicate and
    /// update callbacks.
    pub fn to_map(&self) -> Result<Row> {
        let mut row = Row::with_capacity(self.fields.len());
        for field in &self.fields {
            row.insert(
                field.column.name.clone(),
                Value::decode(field.column.column_type, &field.value)?,
            );
        }
        Ok(row)
    }

    fn decode_field(&self, name: &str) -> Result<Value> {
        let field = self.field(name).ok_or_else(|| DatabaseError::NoSuchColumn {
            name: name.to_string(),
        })?;
        Value::decode(field.column.column_type, &field.value)
    }
}

fn truncated(column: &Column) -> DatabaseError {
    DatabaseError::CorruptedRecord {
        reason: format!("record data truncated at column '{}'", column.name),
    }
}

use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::Write,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    storage::{FILE_MODE, JSON_EXTENSION},
    types::{
        error::{DatabaseError, Result},
        value::ColumnType,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Declared on-disk size in bytes; -1 for variable-width columns.
    pub size: i32,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Column {
            name: name.into(),
            column_type,
            size: column_type.declared_size(),
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// The typed layout of a table's records. Column order is part of the
/// schema identity: it fixes the on-disk record layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: String,
    /// SHA-256 over the columns sorted by name; identifies the logical
    /// column set independently of declaration order.
    pub hash: String,
    pub columns: Vec<Column>,
    #[serde(rename = "primaryKeys", default)]
    pub primary_keys: Vec<String>,
}

impl Schema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// Registry of persisted schemas, one `<id>.json` file each.
pub struct SchemaManager {
    schemas_dir: PathBuf,
    id_to_schema: HashMap<String, Schema>,
}

impl SchemaManager {
    /// Load every schema JSON file found in the directory.
    pub fn init(schemas_dir: impl AsRef<Path>) -> Result<Self> {
        let schemas_dir = schemas_dir.as_ref().to_path_buf();

        let mut id_to_schema = HashMap::new();
        for entry in fs::read_dir(&schemas_dir)? {
            let entry = entry?;
            let path = entry.path();

            let is_file = entry.file_type()?.is_file();
            let is_json = path.extension().and_then(|ext| ext.to_str()) == Some(JSON_EXTENSION);
            if !is_file || !is_json {
                continue;
            }

            let schema: Schema = serde_json::from_slice(&fs::read(&path)?)?;
            id_to_schema.insert(schema.id.clone(), schema);
        }

        Ok(SchemaManager {
            schemas_dir,
            id_to_schema,
        })
    }

    /// Register a new schema under a fresh id and persist it as
    /// `<id>.json` in the schemas directory.
    pub fn create(&mut self, columns: Vec<Column>, primary_keys: Vec<String>) -> Result<&Schema> {
        for (index, column) in columns.iter().enumerate() {
            if columns[..index].iter().any(|other| other.name == column.name) {
                return Err(DatabaseError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
        }
        for key in &primary_keys {
            if !columns.iter().any(|column| &column.name == key) {
                return Err(DatabaseError::NoSuchColumn { name: key.clone() });
            }
        }

        let id = Uuid::new_v4().to_string();
        let hash = hash_columns(&columns)?;

        let schema = Schema {
            id: id.clone(),
            hash,
            columns,
            primary_keys,
        };

        let path = self.schemas_dir.join(format!("{id}.{JSON_EXTENSION}"));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(FILE_MODE)
            .open(&path)?;
        file.write_all(&serde_json::to_vec(&schema)?)?;
        file.sync_all()?;

        Ok(self.id_to_schema.entry(id).or_insert(schema))
    }

    pub fn lookup(&self, id: &str) -> Option<&Schema> {
        self.id_to_schema.get(id)
    }
}

/// Content hash over the columns sorted by name, so that two schemas with
/// the same logical columns hash identically regardless of declaration
/// order.
fn hash_columns(columns: &[Column]) -> Result<String> {
    let mut sorted: Vec<&Column> = columns.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let marshalled = serde_json::to_vec(&sorted)?;
    Ok(hex::encode(Sha256::digest(marshalled)))
}

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    storage::{
        schema::{Schema, SchemaManager},
        table::{Table, TableMetadata},
        JSON_EXTENSION,
    },
    types::{
        error::{DatabaseError, Result},
        record::{Record, Row},
    },
};

/// The engine proper: owns the table registry and exposes the public
/// insert/find/update/delete/vacuum operations. Callers arrange
/// per-table exclusivity; every operation is its own unit of work.
pub struct TableManager {
    table_dir: PathBuf,
    name_to_table: HashMap<String, Table>,
}

impl TableManager {
    /// Register every table whose metadata file lives in the directory,
    /// resolving each schema id against the registry.
    pub fn init(table_dir: impl AsRef<Path>, schemas: &SchemaManager) -> Result<Self> {
        let table_dir = table_dir.as_ref().to_path_buf();

        let mut name_to_table = HashMap::new();
        for entry in fs::read_dir(&table_dir)? {
            let entry = entry?;
            let path = entry.path();

            let is_file = entry.file_type()?.is_file();
            let is_json = path.extension().and_then(|ext| ext.to_str()) == Some(JSON_EXTENSION);
            if !is_file || !is_json {
                continue;
            }

            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let metadata: TableMetadata = serde_json::from_slice(&fs::read(&path)?)?;
            let schema = schemas
                .lookup(&metadata.schema_id)
                .ok_or_else(|| DatabaseError::SchemaUnknown {
                    id: metadata.schema_id.clone(),
                })?
                .clone();

            let table = Table::from_metadata(&table_dir, name, metadata, schema)?;
            name_to_table.insert(name.to_string(), table);
        }

        debug!(tables = name_to_table.len(), "table manager initialized");

        Ok(TableManager {
            table_dir,
            name_to_table,
        })
    }

    pub fn create_table(&mut self, name: &str, schema: &Schema) -> Result<&Table> {
        if self.name_to_table.contains_key(name) {
            return Err(DatabaseError::TableExists {
                name: name.to_string(),
            });
        }

        let table = Table::create(&self.table_dir, name, schema.clone())?;
        Ok(self.name_to_table.entry(name.to_string()).or_insert(table))
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.name_to_table.get(name)
    }

    pub fn insert(&mut self, table_name: &str, row: &Row) -> Result<()> {
        let table = self.table_mut(table_name)?;
        let record = Record::from_map(&table.schema, row)?;

        check_unique(table, &record)?;

        table.insert_serialized(&record.serialize())
    }

    pub fn get_all_records(&self, table_name: &str) -> Result<Vec<Record>> {
        self.table_ref(table_name)?.scan_records()
    }

    pub fn find_by_condition<P>(&self, table_name: &str, predicate: P) -> Result<Vec<Record>>
    where
        P: Fn(&Row) -> bool,
    {
        let table = self.table_ref(table_name)?;
        let (_, matches) = table.collect_matches(predicate)?;
        Ok(matches.into_iter().map(|matched| matched.record).collect())
    }

    /// First match in page/slot order, or `RecordNotFound`.
    pub fn find_first_by_condition<P>(&self, table_name: &str, predicate: P) -> Result<Record>
    where
        P: Fn(&Row) -> bool,
    {
        self.find_by_condition(table_name, predicate)?
            .into_iter()
            .next()
            .ok_or(DatabaseError::RecordNotFound)
    }

    /// Tombstone every matching record by flipping its slot status byte;
    /// payloads stay on disk until vacuum.
    pub fn delete_by_condition<P>(&mut self, table_name: &str, predicate: P) -> Result<()>
    where
        P: Fn(&Row) -> bool,
    {
        let table = self.table_ref(table_name)?;
        let (file, matches) = table.collect_matches(predicate)?;

        for matched in &matches {
            Table::tombstone_slot(&file, matched.page_offset, matched.slot_index)?;
        }

        Ok(())
    }

    /// Rewrite every matching record: apply the caller's mutator to the
    /// materialized row, insert the rebuilt record through standard
    /// placement, then tombstone the original slot.
    pub fn update_by_condition<P, U>(&mut self, table_name: &str, predicate: P, apply: U) -> Result<()>
    where
        P: Fn(&Row) -> bool,
        U: Fn(&mut Row),
    {
        let table = self.table_mut(table_name)?;
        let (file, matches) = table.collect_matches(predicate)?;

        for matched in matches {
            let mut row = matched.record.to_map()?;
            apply(&mut row);

            let rebuilt = Record::from_map(&table.schema, &row)?;
            table.insert_serialized(&rebuilt.serialize())?;
            Table::tombstone_slot(&file, matched.page_offset, matched.slot_index)?;
        }

        Ok(())
    }

    pub fn full_vacuum(&mut self, table_name: &str) -> Result<()> {
        let table = self.table_mut(table_name)?;
        table.full_vacuum()?;

        debug!(
            table = table_name,
            num_pages = table.num_pages,
            "vacuum finished"
        );

        Ok(())
    }

    fn table_ref(&self, name: &str) -> Result<&Table> {
        self.name_to_table
            .get(name)
            .ok_or_else(|| DatabaseError::TableUnknown {
                name: name.to_string(),
            })
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.name_to_table
            .get_mut(name)
            .ok_or_else(|| DatabaseError::TableUnknown {
                name: name.to_string(),
            })
    }
}

/// Primary-key uniqueness: reject the candidate when any stored record
/// matches it on every primary-key column.
fn check_unique(table: &Table, candidate: &Record) -> Result<()> {
    if table.schema.primary_keys.is_empty() {
        return Ok(());
    }

    for existing in table.scan_records()? {
        let clash = table
            .schema
            .primary_keys
            .iter()
            .all(|key| match (existing.field(key), candidate.field(key)) {
                (Some(theirs), Some(ours)) => theirs.value == ours.value,
                _ => false,
            });

        if clash {
            return Err(DatabaseError::UniqueViolation {
                columns: table.schema.primary_keys.clone(),
            });
        }
    }

    Ok(())
}

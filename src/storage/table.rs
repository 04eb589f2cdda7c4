use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    os::unix::fs::{FileExt, OpenOptionsExt},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    storage::{page_iter::PagesIterator, schema::Schema, DATA_EXTENSION, FILE_MODE, JSON_EXTENSION},
    types::{
        error::{DatabaseError, Result},
        page::Page,
        record::{Record, Row},
        PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_ENTRY_SIZE, SLOT_STATUS_DELETED,
    },
};

/// On-disk companion of a data file, stored as `<table>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub schema_id: String,
    pub num_pages: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub data_path: PathBuf,
    pub metadata_path: PathBuf,
    pub num_pages: u64,
    pub schema: Schema,
    pub created_at: DateTime<Utc>,
}

/// A record that satisfied a scan predicate, with enough position
/// information to tombstone its slot afterwards.
pub struct MatchedRecord {
    pub record: Record,
    pub slot_index: usize,
    pub page_offset: u64,
}

impl Table {
    /// Create the empty data file and the initial metadata file, both
    /// create-exclusive.
    pub fn create(dir: &Path, name: &str, schema: Schema) -> Result<Table> {
        let table = Table {
            name: name.to_string(),
            data_path: dir.join(format!("{name}.{DATA_EXTENSION}")),
            metadata_path: dir.join(format!("{name}.{JSON_EXTENSION}")),
            num_pages: 0,
            schema,
            created_at: Utc::now(),
        };

        create_exclusive(&table.data_path)?;

        let mut metadata_file = create_exclusive(&table.metadata_path)?;
        metadata_file.write_all(&serde_json::to_vec(&table.metadata())?)?;
        metadata_file.sync_all()?;

        Ok(table)
    }

    /// Rebuild the in-memory table from persisted metadata. When the data
    /// file length disagrees with the stored page count, the file wins;
    /// the repaired count reaches disk with the next metadata write.
    pub fn from_metadata(
        dir: &Path,
        name: &str,
        metadata: TableMetadata,
        schema: Schema,
    ) -> Result<Table> {
        let data_path = dir.join(format!("{name}.{DATA_EXTENSION}"));

        let num_pages = match fs::metadata(&data_path) {
            Ok(info) => {
                let on_disk = info.len() / PAGE_SIZE as u64;
                if on_disk != metadata.num_pages {
                    debug!(
                        table = name,
                        stored = metadata.num_pages,
                        on_disk,
                        "page count repaired from file size"
                    );
                }
                on_disk
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => metadata.num_pages,
            Err(err) => return Err(err.into()),
        };

        Ok(Table {
            name: name.to_string(),
            data_path,
            metadata_path: dir.join(format!("{name}.{JSON_EXTENSION}")),
            num_pages,
            schema,
            created_at: metadata.created_at,
        })
    }

    pub fn metadata(&self) -> TableMetadata {
        TableMetadata {
            schema_id: self.schema.id.clone(),
            num_pages: self.num_pages,
            created_at: self.created_at,
        }
    }

    /// First-fit placement of one serialized record, from page zero.
    pub fn insert_serialized(&mut self, data: &[u8]) -> Result<()> {
        let file = self.open_data_rw()?;
        let file_size = file.metadata()?.len();

        if file_size == 0 {
            let mut page = Page::empty();
            page.insert(data)?;
            file.write_all_at(&page.to_bytes(), 0)?;

            self.num_pages = 1;
            return self.persist_metadata();
        }

        let mut iter = PagesIterator::new(&file)?;
        while iter.next() {
            let mut page = iter.current_page()?;
            if !page.has_free_space(data.len()) {
                continue;
            }

            page.insert(data)?;
            file.write_all_at(&page.to_bytes(), iter.current_offset())?;
            return Ok(());
        }

        // the append offset comes from the file size at allocation time
        let num_pages = file_size / PAGE_SIZE as u64;
        let mut page = Page::empty();
        page.insert(data)?;
        file.write_all_at(&page.to_bytes(), num_pages * PAGE_SIZE as u64)?;

        self.num_pages = num_pages + 1;
        self.persist_metadata()
    }

    /// Every active record, in page/slot order.
    pub fn scan_records(&self) -> Result<Vec<Record>> {
        let file = File::open(&self.data_path)?;
        let mut records = Vec::new();

        let mut iter = PagesIterator::new(&file)?;
        while iter.next() {
            let page = iter.current_page()?;
            for slot in page.slots.iter().filter(|slot| slot.is_active()) {
                records.push(Record::deserialize(&self.schema, page.slot_payload(slot))?);
            }
        }

        Ok(records)
    }

    /// Scan phase of find/update/delete: collect every active record the
    /// predicate accepts, returning the still-open handle for the action
    /// phase.
    pub fn collect_matches<P>(&self, predicate: P) -> Result<(File, Vec<MatchedRecord>)>
    where
        P: Fn(&Row) -> bool,
    {
        let file = self.open_data_rw()?;
        let mut matches = Vec::new();

        let mut iter = PagesIterator::new(&file)?;
        while iter.next() {
            let page = iter.current_page()?;
            for (slot_index, slot) in page.slots.iter().enumerate() {
                if !slot.is_active() {
                    continue;
                }

                let record = Record::deserialize(&self.schema, page.slot_payload(slot))?;
                if predicate(&record.to_map()?) {
                    matches.push(MatchedRecord {
                        record,
                        slot_index,
                        page_offset: iter.current_offset(),
                    });
                }
            }
        }

        Ok((file, matches))
    }

    /// Flip one slot's status byte to the tombstone marker. Nothing else
    /// in the page is rewritten.
    pub fn tombstone_slot(file: &File, page_offset: u64, slot_index: usize) -> Result<()> {
        let status_offset =
            page_offset + (PAGE_HEADER_SIZE + slot_index * SLOT_ENTRY_SIZE + 4) as u64;
        file.write_all_at(&[SLOT_STATUS_DELETED], status_offset)?;
        Ok(())
    }

    /// Rewrite the data file without tombstones under crash-safe file
    /// replacement. Record order is preserved; pages are packed from
    /// offset zero.
    pub fn full_vacuum(&mut self) -> Result<()> {
        let source = File::open(&self.data_path)?;

        let tmp_path = self.data_path.with_extension(format!("{DATA_EXTENSION}.tmp"));
        let tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(FILE_MODE)
            .open(&tmp_path)?;

        let mut buffer_page = Page::empty();
        let mut buffer_offset: u64 = 0;
        let mut new_num_pages: u64 = 0;

        let mut iter = PagesIterator::new(&source)?;
        while iter.next() {
            let page = iter.current_page()?;
            for slot in page.slots.iter().filter(|slot| slot.is_active()) {
                let payload = page.slot_payload(slot);

                match buffer_page.insert(payload) {
                    Ok(_) => {}
                    Err(DatabaseError::PageFull { .. }) => {
                        tmp.write_all_at(&buffer_page.to_bytes(), buffer_offset)?;
                        buffer_offset += PAGE_SIZE as u64;
                        new_num_pages += 1;

                        // any record that fit a source page fits an empty one
                        buffer_page = Page::empty();
                        buffer_page.insert(payload)?;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        if buffer_page.num_slots > 0 {
            tmp.write_all_at(&buffer_page.to_bytes(), buffer_offset)?;
            new_num_pages += 1;
        }

        tmp.sync_all()?;

        self.num_pages = new_num_pages;
        self.persist_metadata()?;

        fs::rename(&tmp_path, &self.data_path)?;

        Ok(())
    }

    /// Durable metadata update: temp file, fsync, rename. The rename is
    /// the commit point.
    pub fn persist_metadata(&self) -> Result<()> {
        let tmp_path = self
            .metadata_path
            .with_extension(format!("{JSON_EXTENSION}.tmp"));

        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(FILE_MODE)
            .open(&tmp_path)?;
        tmp.write_all(&serde_json::to_vec(&self.metadata())?)?;
        tmp.sync_all()?;

        fs::rename(&tmp_path, &self.metadata_path)?;

        Ok(())
    }

    fn open_data_rw(&self) -> Result<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.data_path)?)
    }
}

fn create_exclusive(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .mode(FILE_MODE)
        .open(path)?)
}

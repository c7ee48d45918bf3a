//! JSON file row store: one checksummed file per table.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::error::StorageError;
use crate::table::{RowId, TableRow, TableSchema};

use super::io_utils::{classify_io_error, retry_io_operation};
use super::memory::{MemoryStore, StoredRow, TableData};
use super::RowStore;

/// Current table file format version.
pub const TABLE_FILE_VERSION: u32 = 1;

/// On-disk layout of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableFile {
    pub version: u32,
    pub table: String,
    pub next_id: u64,
    /// crc32 of the serialized `rows`
    pub checksum: u32,
    pub rows: Vec<StoredRow>,
}

impl TableFile {
    fn rows_checksum(rows: &[StoredRow]) -> Result<u32, StorageError> {
        let bytes =
            serde_json::to_vec(rows).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let mut hasher = Hasher::new();
        hasher.update(&bytes);
        Ok(hasher.finalize())
    }
}

/// Row store persisting every change to `<data_dir>/<table>.json`.
///
/// Rows are served from memory; each save or delete rewrites the table file
/// atomically. A failed write rolls the in-memory table back.
#[derive(Debug)]
pub struct JsonFileStore {
    config: StoreConfig,
    memory: MemoryStore,
}

impl JsonFileStore {
    /// Opens the store, loading every table file found in the data directory.
    pub fn open(config: StoreConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)
            .map_err(|e| classify_io_error(e, "Failed to create data directory"))?;

        let mut memory = MemoryStore::new();
        let entries = fs::read_dir(&config.data_dir)
            .map_err(|e| classify_io_error(e, "Failed to read data directory"))?;
        for entry in entries {
            let path = entry
                .map_err(|e| classify_io_error(e, "Failed to read data directory"))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let file = Self::read_table_file(&path)?;
            tracing::debug!(table = %file.table, rows = file.rows.len(), "table file loaded");
            let table = file.table.clone();
            memory.restore_table(&table, Some(TableData::from_stored(file.next_id, file.rows)));
        }

        Ok(Self { config, memory })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.config.data_dir.join(format!("{table}.json"))
    }

    fn read_table_file(path: &Path) -> Result<TableFile, StorageError> {
        let mut contents = String::new();
        File::open(path)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(|e| classify_io_error(e, &format!("Failed to read {}", path.display())))?;

        let file: TableFile = serde_json::from_str(&contents).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if file.version != TABLE_FILE_VERSION {
            return Err(StorageError::Serialization(format!(
                "Unsupported table file version {} in {}",
                file.version,
                path.display()
            )));
        }

        let actual = TableFile::rows_checksum(&file.rows)?;
        if actual != file.checksum {
            return Err(StorageError::Corrupted(format!(
                "Checksum mismatch for table '{}': expected {}, got {}",
                file.table, file.checksum, actual
            )));
        }
        Ok(file)
    }

    fn flush_table(&self, table: &str) -> Result<(), StorageError> {
        let (next_id, rows) = self
            .memory
            .table_data(table)
            .map(|data| (data.next_id, data.stored_rows()))
            .unwrap_or((1, Vec::new()));
        let file = TableFile {
            version: TABLE_FILE_VERSION,
            table: table.to_string(),
            next_id,
            checksum: TableFile::rows_checksum(&rows)?,
            rows,
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let final_path = self.table_path(table);
        let temp_path = self.config.data_dir.join(format!("{table}.json.tmp"));
        retry_io_operation(
            || write_atomic(&temp_path, &final_path, &json),
            self.config.max_retries,
            self.config.retry_delay_ms,
            "flush table file",
        )?;
        tracing::debug!(table, path = %final_path.display(), "table file flushed");
        Ok(())
    }

    /// Runs `change` on the in-memory table, then flushes it. The table is
    /// restored when the flush fails.
    fn write_through<T>(
        &mut self,
        table: &str,
        change: impl FnOnce(&mut MemoryStore) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let snapshot = self.memory.table_data(table).cloned();
        let result = change(&mut self.memory)?;
        if let Err(err) = self.flush_table(table) {
            self.memory.restore_table(table, snapshot);
            return Err(err);
        }
        Ok(result)
    }
}

fn write_atomic(temp_path: &Path, final_path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file =
        File::create(temp_path).map_err(|e| classify_io_error(e, "Failed to create temp file"))?;
    file.write_all(bytes)
        .map_err(|e| classify_io_error(e, "Failed to write table file"))?;
    file.sync_all()
        .map_err(|e| classify_io_error(e, "Failed to sync table file"))?;
    fs::rename(temp_path, final_path)
        .map_err(|e| classify_io_error(e, "Failed to rename table file"))
}

impl RowStore for JsonFileStore {
    fn load(&self, schema: &Arc<TableSchema>) -> Result<Vec<TableRow>, StorageError> {
        self.memory.load(schema)
    }

    fn save(&mut self, row: &TableRow) -> Result<RowId, StorageError> {
        let table = row.schema().name().to_string();
        self.write_through(&table, |memory| memory.save(row))
    }

    fn delete(&mut self, schema: &TableSchema, id: RowId) -> Result<(), StorageError> {
        self.write_through(schema.name(), |memory| memory.delete(schema, id))
    }

    fn children_of(
        &self,
        child: &Arc<TableSchema>,
        parent_table: &str,
        parent_id: RowId,
    ) -> Result<Vec<TableRow>, StorageError> {
        self.memory.children_of(child, parent_table, parent_id)
    }

    fn find(&self, schema: &Arc<TableSchema>, id: RowId) -> Result<Option<TableRow>, StorageError> {
        self.memory.find(schema, id)
    }
}

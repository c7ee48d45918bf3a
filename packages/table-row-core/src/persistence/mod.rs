//! Row storage: the `RowStore` port and its in-memory and JSON file adapters.


mod file_store;
pub mod io_utils;
mod memory;

use std::sync::Arc;

pub use file_store::{JsonFileStore, TableFile, TABLE_FILE_VERSION};
pub use memory::{MemoryStore, StoredRow};

use crate::error::StorageError;
use crate::table::{RowId, TableRow, TableSchema};

/// Storage backend for table rows.
///
/// Implementations assign storage ids; rows adopt them on save.
pub trait RowStore {
    /// Every stored row of `schema`'s table, ordered by id.
    fn load(&self, schema: &Arc<TableSchema>) -> Result<Vec<TableRow>, StorageError>;

    /// Inserts `row`, or updates it when its id is already stored.
    ///
    /// Returns the row's storage id.
    fn save(&mut self, row: &TableRow) -> Result<RowId, StorageError>;

    fn delete(&mut self, schema: &TableSchema, id: RowId) -> Result<(), StorageError>;

    /// Rows of `child` whose relation to `parent_table` points at
    /// `parent_id`.
    fn children_of(
        &self,
        child: &Arc<TableSchema>,
        parent_table: &str,
        parent_id: RowId,
    ) -> Result<Vec<TableRow>, StorageError>;

    /// Stored row with `id`, if any.
    fn find(&self, schema: &Arc<TableSchema>, id: RowId) -> Result<Option<TableRow>, StorageError> {
        Ok(self
            .load(schema)?
            .into_iter()
            .find(|row| row.id() == Some(id)))
    }
}

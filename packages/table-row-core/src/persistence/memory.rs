//! In-memory row store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::table::{ColumnId, ColumnValue, RowId, TableRow, TableSchema};

use super::RowStore;

/// One stored row: its id and every value but the id slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: RowId,
    pub values: BTreeMap<ColumnId, ColumnValue>,
}

/// Rows of one table plus its id counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableData {
    pub(crate) next_id: u64,
    pub(crate) rows: BTreeMap<RowId, BTreeMap<ColumnId, ColumnValue>>,
}

impl Default for TableData {
    fn default() -> Self {
        Self {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl TableData {
    pub(crate) fn from_stored(next_id: u64, rows: Vec<StoredRow>) -> Self {
        let rows: BTreeMap<_, _> = rows.into_iter().map(|row| (row.id, row.values)).collect();
        let after_last = rows.keys().next_back().map_or(1, |id| id.0 + 1);
        Self {
            next_id: next_id.max(after_last),
            rows,
        }
    }

    pub(crate) fn stored_rows(&self) -> Vec<StoredRow> {
        self.rows
            .iter()
            .map(|(id, values)| StoredRow {
                id: *id,
                values: values.clone(),
            })
            .collect()
    }
}

/// Row store keeping every table in memory. Ids start at 1 per table.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: HashMap<String, TableData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the tables holding at least one row or id allocation.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |data| data.rows.len())
    }

    pub(crate) fn table_data(&self, table: &str) -> Option<&TableData> {
        self.tables.get(table)
    }

    pub(crate) fn restore_table(&mut self, table: &str, data: Option<TableData>) {
        match data {
            Some(data) => {
                self.tables.insert(table.to_string(), data);
            }
            None => {
                self.tables.remove(table);
            }
        }
    }

    fn to_row(
        schema: &Arc<TableSchema>,
        id: RowId,
        values: &BTreeMap<ColumnId, ColumnValue>,
    ) -> Result<TableRow, StorageError> {
        let mut row = TableRow::from_stored(
            Arc::clone(schema),
            values.iter().map(|(k, v)| (k.clone(), v.clone())),
        )
        .map_err(|e| StorageError::Corrupted(format!("row {id} of '{}': {e}", schema.name())))?;
        row.set_id(id);
        Ok(row)
    }
}

impl RowStore for MemoryStore {
    fn load(&self, schema: &Arc<TableSchema>) -> Result<Vec<TableRow>, StorageError> {
        let Some(data) = self.tables.get(schema.name()) else {
            return Ok(Vec::new());
        };
        data.rows
            .iter()
            .map(|(id, values)| Self::to_row(schema, *id, values))
            .collect()
    }

    fn save(&mut self, row: &TableRow) -> Result<RowId, StorageError> {
        let schema = row.schema();
        let id_column = schema.id_column_id();
        let values: BTreeMap<_, _> = row
            .values()
            .iter()
            .filter(|(column, _)| *column != id_column)
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();

        let data = self.tables.entry(schema.name().to_string()).or_default();
        let id = match row.id() {
            Some(id) if data.rows.contains_key(&id) => id,
            _ => {
                let id = RowId(data.next_id);
                data.next_id += 1;
                id
            }
        };
        data.rows.insert(id, values);
        tracing::debug!(table = schema.name(), id = id.0, "row saved");
        Ok(id)
    }

    fn delete(&mut self, schema: &TableSchema, id: RowId) -> Result<(), StorageError> {
        let removed = self
            .tables
            .get_mut(schema.name())
            .and_then(|data| data.rows.remove(&id));
        if removed.is_none() {
            return Err(StorageError::NotFound {
                table: schema.name().to_string(),
                id: id.0,
            });
        }
        tracing::debug!(table = schema.name(), id = id.0, "row deleted");
        Ok(())
    }

    fn children_of(
        &self,
        child: &Arc<TableSchema>,
        parent_table: &str,
        parent_id: RowId,
    ) -> Result<Vec<TableRow>, StorageError> {
        let relation = child
            .relation_to(parent_table)
            .ok_or_else(|| StorageError::MissingRelation {
                child: child.name().to_string(),
                parent: parent_table.to_string(),
            })?;

        let Some(data) = self.tables.get(child.name()) else {
            return Ok(Vec::new());
        };
        data.rows
            .iter()
            .filter(|(_, values)| {
                values
                    .get(relation.foreign_key())
                    .and_then(|value| value.code().parse::<u64>().ok())
                    == Some(parent_id.0)
            })
            .map(|(id, values)| Self::to_row(child, *id, values))
            .collect()
    }

    fn find(&self, schema: &Arc<TableSchema>, id: RowId) -> Result<Option<TableRow>, StorageError> {
        self.tables
            .get(schema.name())
            .and_then(|data| data.rows.get(&id))
            .map(|values| Self::to_row(schema, id, values))
            .transpose()
    }
}

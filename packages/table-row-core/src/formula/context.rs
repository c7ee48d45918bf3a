//! Evaluation context holding the ancestor rows a formula may read.

use std::collections::HashMap;

use crate::error::{RowError, SchemaError};
use crate::metadata::MetadataSource;
use crate::persistence::RowStore;
use crate::table::{RowId, TableRow};

/// Ancestor rows keyed by table name.
///
/// The context is assembled once, before resolution starts, and is only
/// read during evaluation.
#[derive(Debug, Clone, Default)]
pub struct FormulaContext {
    ancestors: HashMap<String, TableRow>,
}

impl FormulaContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ancestor(mut self, row: TableRow) -> Self {
        self.insert_ancestor(row);
        self
    }

    /// Adds `row` as the ancestor for its table, replacing any previous one.
    pub fn insert_ancestor(&mut self, row: TableRow) {
        self.ancestors.insert(row.schema().name().to_string(), row);
    }

    pub fn ancestor(&self, table: &str) -> Option<&TableRow> {
        self.ancestors.get(table)
    }

    pub fn len(&self) -> usize {
        self.ancestors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ancestors.is_empty()
    }

    /// Loads the parent, grandparent, ... rows of `row` by following the
    /// relations declared on each schema.
    ///
    /// Each table is visited at most once. A relation whose foreign key is
    /// empty, or whose parent row is not stored, is skipped.
    pub fn for_row<M, S>(row: &TableRow, metadata: &M, store: &S) -> Result<Self, RowError>
    where
        M: MetadataSource + ?Sized,
        S: RowStore + ?Sized,
    {
        let mut context = FormulaContext::new();
        let own_table = row.schema().name().to_string();
        let mut pending = vec![row.clone()];

        while let Some(current) = pending.pop() {
            for relation in current.schema().relations() {
                let parent_table = relation.parent_table();
                if parent_table == own_table || context.ancestors.contains_key(parent_table) {
                    continue;
                }

                let Some(parent_id) = current
                    .get(relation.foreign_key().as_str())
                    .and_then(|value| value.code().parse::<u64>().ok())
                    .map(RowId)
                else {
                    tracing::debug!(
                        table = current.schema().name(),
                        parent = parent_table,
                        "no parent id, relation skipped"
                    );
                    continue;
                };

                let parent_schema = metadata
                    .schema(parent_table)
                    .ok_or_else(|| SchemaError::UnknownTable(parent_table.to_string()))?;

                match store.find(&parent_schema, parent_id)? {
                    Some(parent) => {
                        context.insert_ancestor(parent.clone());
                        pending.push(parent);
                    }
                    None => tracing::debug!(
                        parent = parent_table,
                        id = parent_id.0,
                        "parent row not stored, relation skipped"
                    ),
                }
            }
        }

        Ok(context)
    }
}

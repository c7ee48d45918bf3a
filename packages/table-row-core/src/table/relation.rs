//! Relation from a child table to its parent table.

use serde::{Deserialize, Serialize};

use super::value::ColumnId;

/// Relation from a child table to its parent table.
///
/// The child's `foreign_key` column holds the parent row's storage id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Name of the parent table
    parent_table: String,
    /// Column in the child table holding the parent id
    foreign_key: ColumnId,
}

impl Relation {
    pub fn new(parent_table: impl Into<String>, foreign_key: impl Into<ColumnId>) -> Self {
        Self {
            parent_table: parent_table.into(),
            foreign_key: foreign_key.into(),
        }
    }

    pub fn parent_table(&self) -> &str {
        &self.parent_table
    }

    pub fn foreign_key(&self) -> &ColumnId {
        &self.foreign_key
    }
}

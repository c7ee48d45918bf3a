//! Serde model of a JSON catalog document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::selection::SelectionList;
use crate::table::{ColumnId, ColumnType, Relation};

/// Catalog format version understood by this crate.
pub const CATALOG_VERSION: u32 = 1;

/// Root of a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub version: u32,
    /// Named selection lists referenced by picklist columns
    #[serde(default)]
    pub lists: BTreeMap<String, SelectionList>,
    pub tables: Vec<TableDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDocument {
    pub name: String,
    #[serde(default = "default_id_column")]
    pub id_column: ColumnId,
    #[serde(default)]
    pub version_column: Option<ColumnId>,
    pub columns: Vec<ColumnDocument>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

fn default_id_column() -> ColumnId {
    ColumnId::from("id")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDocument {
    pub id: ColumnId,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub mandatory: MandatoryDocument,
    #[serde(default)]
    pub natural_key: bool,
    #[serde(default)]
    pub foreign_key: bool,
    /// List name, or a formula solving to one
    #[serde(default)]
    pub picklist: Option<String>,
    #[serde(default)]
    pub default_code: String,
    #[serde(default)]
    pub default_label: String,
    #[serde(default)]
    pub code_formula: String,
    #[serde(default)]
    pub label_formula: String,
}

/// `mandatory` is either a flag or a formula solved against the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MandatoryDocument {
    Flag(bool),
    Formula(String),
}

impl Default for MandatoryDocument {
    fn default() -> Self {
        MandatoryDocument::Flag(false)
    }
}

//! Metadata port: where schemas and selection lists come from.

mod catalog;
mod document;

use std::sync::Arc;

pub use catalog::Catalog;
pub use document::{
    CatalogDocument, ColumnDocument, MandatoryDocument, TableDocument, CATALOG_VERSION,
};

use crate::selection::SelectionList;
use crate::table::TableSchema;

/// Source of table schemas and named selection lists.
pub trait MetadataSource {
    fn schema(&self, table: &str) -> Option<Arc<TableSchema>>;

    fn selection_list(&self, name: &str) -> Option<SelectionList>;
}

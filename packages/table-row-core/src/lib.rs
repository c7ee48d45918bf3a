//! Schema-driven table rows.
//!
//! Provides column schemas, rows whose values derive from per-column
//! formulas, versioning, picklist selections, and ports to metadata and
//! row storage.

pub mod config;
pub mod error;
pub mod formula;
pub mod metadata;
pub mod persistence;
pub mod selection;
pub mod table;
pub mod version;

pub use config::StoreConfig;
pub use error::{CatalogError, RowError, SchemaError, StorageError};
pub use formula::{FormulaContext, FormulaError, HeaderKind};
pub use metadata::{Catalog, MetadataSource};
pub use persistence::{JsonFileStore, MemoryStore, RowStore};
pub use selection::{Selection, SelectionList};
pub use table::{ColumnDefinition, ColumnId, ColumnType, ColumnValue, RowId, TableRow, TableSchema};
pub use version::{next_version, DottedVersion, VersionFormatError, VersionPolicy};

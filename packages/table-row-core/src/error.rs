//! Error types for schema, row, storage and catalog operations.
//!
//! Formula and version errors live next to their engines
//! ([`crate::formula::FormulaError`], [`crate::version::VersionFormatError`])
//! and are wrapped by [`RowError`] when they surface from a row operation.

use thiserror::Error;

use crate::formula::FormulaError;
use crate::version::VersionFormatError;

/// Schema construction and lookup errors.
///
/// Schemas are validated once when they are built, so these indicate a
/// programming or metadata error rather than a recoverable condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Column not declared on the table
    #[error("Column '{column}' not found in table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Table name that is not an identifier
    #[error("Invalid table name '{0}'")]
    InvalidTableName(String),

    /// Column declared twice
    #[error("Column '{column}' declared more than once in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// Version column named but not declared
    #[error("Version column '{column}' is not a column of table '{table}'")]
    UnknownVersionColumn { table: String, column: String },

    /// Formula that does not parse
    #[error("Invalid {header} formula on column '{column}' of table '{table}': {source}")]
    InvalidFormula {
        table: String,
        column: String,
        header: &'static str,
        #[source]
        source: FormulaError,
    },

    /// Formula referencing a column the table does not have
    #[error("Formula on column '{column}' of table '{table}' references unknown column '{reference}'")]
    UnknownReference {
        table: String,
        column: String,
        reference: String,
    },

    /// Relation that cannot be followed
    #[error("Invalid relation from '{table}' to '{parent}' via '{column}': {reason}")]
    InvalidRelation {
        table: String,
        parent: String,
        column: String,
        reason: &'static str,
    },

    /// Table kind unknown to the metadata source
    #[error("Table '{0}' not found")]
    UnknownTable(String),
}

/// Errors surfaced by persistence adapters.
///
/// The row that triggered the failure keeps its in-memory state, so the
/// caller may retry the whole operation.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Transient I/O error that may succeed on retry
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored data does not verify or does not match its schema
    #[error("Data corruption detected: {0}")]
    Corrupted(String),

    /// Row id unknown to the store
    #[error("Row {id} not found in table '{table}'")]
    NotFound { table: String, id: u64 },

    /// Child table declares no relation to the requested parent
    #[error("Table '{child}' has no relation to parent table '{parent}'")]
    MissingRelation { child: String, parent: String },

    /// Opaque failure from a backend
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors returned by [`crate::table::TableRow`] operations.
#[derive(Error, Debug, Clone)]
pub enum RowError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Version(#[from] VersionFormatError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Operation needs a storage id the row does not have yet
    #[error("Row of table '{table}' has not been persisted")]
    NotPersisted { table: String },

    /// Edit aimed at a column users cannot change
    #[error("Column '{column}' is not editable")]
    ReadOnlyColumn { column: String },

    /// Typed edit rejected by the column type
    #[error("Invalid input '{input}' for {expected} column '{column}'")]
    InvalidInput {
        column: String,
        expected: &'static str,
        input: String,
    },
}

/// Errors raised while loading a metadata catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("I/O error reading catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported catalog version: {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Picklist name that no list in the catalog carries
    #[error("Column '{column}' of table '{table}' uses unknown selection list '{list}'")]
    UnknownList {
        table: String,
        column: String,
        list: String,
    },

    /// Qualified formula reference that is not an ancestor table
    #[error("Formula on column '{column}' of table '{table}' references '{ancestor}', which is not an ancestor table")]
    UnreachableAncestor {
        table: String,
        column: String,
        ancestor: String,
    },

    /// Ancestor reference in a header solved without the row's ancestors
    #[error("{header} formula on column '{column}' of table '{table}' may only reference the row itself, found '{reference}'")]
    AncestorInRowRule {
        table: String,
        column: String,
        header: &'static str,
        reference: String,
    },

    #[error("Table '{0}' declared more than once")]
    DuplicateTable(String),
}

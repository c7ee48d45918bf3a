//! Table schema: ordered column definitions for one table kind.
//!
//! Each schema has:
//! - Column definitions in declaration order (formula passes follow it)
//! - The id column holding the storage id of a row
//! - An optional version column
//! - Relations to parent tables

use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::version::{DottedVersion, VersionPolicy};

use super::column::ColumnDefinition;
use super::relation::Relation;
use super::validation;
use super::value::ColumnId;

/// Table schema shared by every row of one table kind.
///
/// Two schemas are equal when they describe the same table kind, i.e. have
/// the same name; column contents are not compared.
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnDefinition>,
    id_column: ColumnId,
    version_column: Option<ColumnId>,
    relations: Vec<Relation>,
    version_policy: Arc<dyn VersionPolicy>,
}

impl TableSchema {
    /// Creates a new schema after validating its columns.
    ///
    /// # Arguments
    /// * `name` - Table name
    /// * `columns` - Column definitions, in declaration order
    /// * `id_column` - Column holding the storage id; it may be left out of
    ///   `columns`, in which case it is a reserved slot of every row
    /// * `version_column` - Declared column holding the row version
    /// * `relations` - Relations to parent tables
    ///
    /// # Returns
    /// `Result<TableSchema, SchemaError>` containing the schema or the first
    /// validation failure.
    pub fn create(
        name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        id_column: impl Into<ColumnId>,
        version_column: Option<ColumnId>,
        relations: Vec<Relation>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        let id_column = id_column.into();

        validation::validate_table_name(&name)?;
        validation::validate_unique_columns(&name, &columns)?;
        validation::validate_version_column(&name, &columns, version_column.as_ref())?;
        validation::validate_relations(&name, &columns, &relations)?;
        validation::validate_formulas(&name, &columns, &id_column)?;

        Ok(Self {
            name,
            columns,
            id_column,
            version_column,
            relations,
            version_policy: Arc::new(DottedVersion),
        })
    }

    /// Starts a builder for table `name` with id column `"id"`.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column definitions in declaration order.
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Looks up a declared column.
    ///
    /// An unknown id is a programming error: schemas are validated when
    /// built, so callers only ask for columns they know exist.
    pub fn get_by_id(&self, id: &str) -> Result<&ColumnDefinition, SchemaError> {
        self.find(id).ok_or_else(|| SchemaError::UnknownColumn {
            table: self.name.clone(),
            column: id.to_string(),
        })
    }

    pub fn find(&self, id: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.id().as_str() == id)
    }

    /// Whether `id` is a declared column.
    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Whether a row of this table may hold a value under `id`.
    pub fn has_slot(&self, id: &str) -> bool {
        self.id_column.as_str() == id || self.contains(id)
    }

    pub fn id_column_id(&self) -> &ColumnId {
        &self.id_column
    }

    pub fn version_column_id(&self) -> Option<&ColumnId> {
        self.version_column.as_ref()
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Relation towards `parent_table`, if declared.
    pub fn relation_to(&self, parent_table: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|r| r.parent_table() == parent_table)
    }

    /// Natural-key columns in declaration order.
    pub fn natural_keys(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.iter().filter(|c| c.is_natural_key())
    }

    pub fn version_policy(&self) -> &dyn VersionPolicy {
        self.version_policy.as_ref()
    }

    /// Replaces the version policy, [`DottedVersion`] by default.
    pub fn with_version_policy(mut self, policy: Arc<dyn VersionPolicy>) -> Self {
        self.version_policy = policy;
        self
    }
}

impl PartialEq for TableSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TableSchema {}

impl fmt::Debug for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSchema")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("id_column", &self.id_column)
            .field("version_column", &self.version_column)
            .field("relations", &self.relations)
            .field("version_policy", &self.version_policy)
            .finish()
    }
}

/// Builder for [`TableSchema`].
pub struct SchemaBuilder {
    name: String,
    columns: Vec<ColumnDefinition>,
    id_column: ColumnId,
    version_column: Option<ColumnId>,
    relations: Vec<Relation>,
    version_policy: Option<Arc<dyn VersionPolicy>>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            id_column: ColumnId::from("id"),
            version_column: None,
            relations: Vec::new(),
            version_policy: None,
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn id_column(mut self, id: impl Into<ColumnId>) -> Self {
        self.id_column = id.into();
        self
    }

    pub fn version_column(mut self, id: impl Into<ColumnId>) -> Self {
        self.version_column = Some(id.into());
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn version_policy(mut self, policy: Arc<dyn VersionPolicy>) -> Self {
        self.version_policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<TableSchema, SchemaError> {
        let schema = TableSchema::create(
            self.name,
            self.columns,
            self.id_column,
            self.version_column,
            self.relations,
        )?;
        Ok(match self.version_policy {
            Some(policy) => schema.with_version_policy(policy),
            None => schema,
        })
    }
}

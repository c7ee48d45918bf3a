//! Generic table row bound to a shared schema.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RowError, SchemaError};
use crate::formula::{Accessor, Formula, FormulaContext, FormulaSolver, HeaderKind};
use crate::persistence::RowStore;

use super::column::ColumnDefinition;
use super::schema::TableSchema;
use super::value::{ColumnId, ColumnValue, RowId};

/// Validation status of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    Ok,
    MandatoryMissing,
    /// Reserved for failures reported by external validation
    Error,
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowStatus::Ok => write!(f, "OK"),
            RowStatus::MandatoryMissing => write!(f, "MANDATORY_MISSING"),
            RowStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of [`TableRow::put_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// Plain text cannot fill a picklist column; nothing was written
    Rejected,
}

/// One row of a table: typed values keyed by column id.
///
/// The schema is shared and read-only; the values are owned by the row.
#[derive(Clone)]
pub struct TableRow {
    schema: Arc<TableSchema>,
    values: HashMap<ColumnId, ColumnValue>,
}

impl TableRow {
    /// Creates an empty row. Call [`initialize`](Self::initialize) to seed
    /// it with defaults.
    pub fn new(schema: Arc<TableSchema>) -> Self {
        Self {
            schema,
            values: HashMap::new(),
        }
    }

    /// Creates a row holding a single value.
    pub fn with_value(
        schema: Arc<TableSchema>,
        column: impl Into<ColumnId>,
        value: ColumnValue,
    ) -> Result<Self, RowError> {
        let mut row = Self::new(schema);
        row.put(column, value)?;
        Ok(row)
    }

    /// Rebuilds a row from stored values, skipping initialization.
    ///
    /// Every column id must have a slot on `schema`.
    pub fn from_stored(
        schema: Arc<TableSchema>,
        values: impl IntoIterator<Item = (ColumnId, ColumnValue)>,
    ) -> Result<Self, SchemaError> {
        let mut row = Self::new(schema);
        for (id, value) in values {
            row.check_slot(id.as_str())?;
            row.values.insert(id, value);
        }
        Ok(row)
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    /// Storage id, or `None` when the row has not been persisted.
    pub fn id(&self) -> Option<RowId> {
        self.values
            .get(self.schema.id_column_id())
            .and_then(|value| value.code().parse::<u64>().ok())
            .map(RowId)
    }

    /// Storage id, or `-1` when the row has not been persisted.
    pub fn raw_id(&self) -> i64 {
        self.id()
            .and_then(|id| i64::try_from(id.0).ok())
            .unwrap_or(-1)
    }

    pub fn set_id(&mut self, id: RowId) {
        self.values.insert(
            self.schema.id_column_id().clone(),
            ColumnValue::text(id.to_string()),
        );
    }

    /// Current version value, if the table keeps versions.
    pub fn version(&self) -> Option<&ColumnValue> {
        self.schema
            .version_column_id()
            .and_then(|id| self.values.get(id))
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.values.get(column)
    }

    /// Writes a value slot directly. Formulas are not recomputed.
    pub fn put(&mut self, column: impl Into<ColumnId>, value: ColumnValue) -> Result<(), RowError> {
        let column = column.into();
        self.check_slot(column.as_str())?;
        self.values.insert(column, value);
        Ok(())
    }

    /// Writes plain text into a non-picklist column.
    ///
    /// Picklist columns need a code/description pair, so text aimed at one
    /// is logged and dropped.
    pub fn put_text(
        &mut self,
        column: impl Into<ColumnId>,
        label: impl Into<String>,
    ) -> Result<PutOutcome, RowError> {
        let column = column.into();
        self.check_slot(column.as_str())?;

        if self
            .schema
            .find(column.as_str())
            .is_some_and(ColumnDefinition::is_picklist)
        {
            tracing::warn!(
                table = self.schema.name(),
                column = %column,
                "text rejected for picklist column, put a selection instead"
            );
            return Ok(PutOutcome::Rejected);
        }

        self.values.insert(column, ColumnValue::text(label));
        Ok(PutOutcome::Stored)
    }

    /// Removes a value slot.
    pub fn remove(&mut self, column: &str) -> Option<ColumnValue> {
        self.values.remove(column)
    }

    /// Values in schema order, the id slot first.
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnId, &ColumnValue)> {
        let id_column = self.schema.id_column_id();
        let id_slot = self
            .schema
            .find(id_column.as_str())
            .is_none()
            .then(|| self.values.get_key_value(id_column))
            .flatten();
        id_slot.into_iter().chain(
            self.schema
                .columns()
                .iter()
                .filter_map(move |column| self.values.get_key_value(column.id())),
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Seeds the row with the default code and label of every column.
    ///
    /// Foreign-key columns are left unset; the caller fills them through
    /// relations. Every other column gets a slot, possibly empty.
    pub fn initialize(&mut self) -> Result<(), RowError> {
        self.initialize_with(&FormulaContext::default())
    }

    /// [`initialize`](Self::initialize) with ancestor rows available to
    /// qualified references.
    pub fn initialize_with(&mut self, context: &FormulaContext) -> Result<(), RowError> {
        let schema = Arc::clone(&self.schema);
        for column in schema.columns().iter().filter(|c| !c.is_foreign_key()) {
            self.values
                .entry(column.id().clone())
                .or_insert_with(|| ColumnValue::empty_for(column.column_type()));
        }

        let solver = FormulaSolver::new(context);
        let codes = solver.solve_all(self, HeaderKind::DefaultCode);
        let labels = solver.solve_all(self, HeaderKind::DefaultLabel);
        codes.and(labels)?;
        Ok(())
    }

    /// Recomputes every derived column: all code formulas first, then all
    /// label formulas. Editable columns are never touched.
    pub fn update_formulas(&mut self) -> Result<(), RowError> {
        self.update_formulas_with(&FormulaContext::default())
    }

    /// [`update_formulas`](Self::update_formulas) with ancestor rows
    /// available to qualified references.
    pub fn update_formulas_with(&mut self, context: &FormulaContext) -> Result<(), RowError> {
        let solver = FormulaSolver::new(context);
        let codes = solver.solve_all(self, HeaderKind::CodeFormula);
        let labels = solver.solve_all(self, HeaderKind::LabelFormula);
        codes.and(labels)?;
        Ok(())
    }

    /// Applies one solved formula to its column.
    ///
    /// Returns `false` without writing when the column is editable or the
    /// solved text is empty.
    pub fn update_from_formula(&mut self, formula: &Formula) -> Result<bool, RowError> {
        let schema = Arc::clone(&self.schema);
        let column = schema.get_by_id(formula.column().as_str())?;
        Ok(self.apply_formula(column, formula))
    }

    pub(crate) fn apply_formula(&mut self, column: &ColumnDefinition, formula: &Formula) -> bool {
        let kind = formula.kind();
        let solved = formula.solved();
        if solved.is_empty() || (!kind.is_default() && column.is_editable()) {
            return false;
        }

        let target = kind.target();
        let described = if column.is_picklist()
            && target == Accessor::Code
            && !column.formulas().has(kind.counterpart())
        {
            column
                .list(self)
                .get(solved)
                .map(|selection| selection.description().to_string())
        } else {
            None
        };

        let slot = self
            .values
            .entry(column.id().clone())
            .or_insert_with(|| ColumnValue::empty_for(column.column_type()));
        let before = slot.clone();
        slot.set(target, solved);
        if let Some(description) = described {
            slot.set_label(description);
        }
        *slot != before
    }

    /// Bumps the version value with the schema's version policy.
    ///
    /// Returns the new version, or `None` when the table keeps no version.
    /// On a malformed version the value is left unchanged.
    pub fn create_new_version(&mut self) -> Result<Option<String>, RowError> {
        let Some(version_column) = self.schema.version_column_id().cloned() else {
            tracing::warn!(
                table = self.schema.name(),
                "cannot create a new version, table keeps no version column"
            );
            return Ok(None);
        };

        let Some(current) = self.values.get(&version_column) else {
            tracing::warn!(
                table = self.schema.name(),
                column = %version_column,
                "cannot create a new version, version value missing"
            );
            return Ok(None);
        };

        let next = self.schema.version_policy().next_version(current.code())?;
        self.values
            .insert(version_column, ColumnValue::text(next.clone()));
        Ok(Some(next))
    }

    /// Whether every column mandatory for this row holds a value.
    pub fn are_mandatory_filled(&self) -> bool {
        self.schema
            .columns()
            .iter()
            .all(|column| !column.is_mandatory(self) || !self.is_empty_field(column))
    }

    /// Mandatory columns that are still empty, in schema order.
    pub fn missing_mandatory(&self) -> Vec<ColumnId> {
        self.schema
            .columns()
            .iter()
            .filter(|column| column.is_mandatory(self) && self.is_empty_field(column))
            .map(|column| column.id().clone())
            .collect()
    }

    pub fn status(&self) -> RowStatus {
        if self.are_mandatory_filled() {
            RowStatus::Ok
        } else {
            RowStatus::MandatoryMissing
        }
    }

    /// Whether `other` denotes the same business entity.
    ///
    /// Rows match when they share a schema and every natural-key column is
    /// equal. A natural-key column empty in both rows is a mismatch: two
    /// incomplete rows are not assumed to be the same.
    pub fn same_as(&self, other: &TableRow) -> bool {
        if self.schema != other.schema {
            return false;
        }

        let id_column = self.schema.id_column_id();
        for column in self.schema.natural_keys() {
            if column.id() == id_column {
                continue;
            }
            let mine = self.get(column.id().as_str());
            let theirs = other.get(column.id().as_str());
            let empty = |value: Option<&ColumnValue>| value.map_or(true, ColumnValue::is_empty);
            if empty(mine) && empty(theirs) {
                return false;
            }
            if mine != theirs {
                return false;
            }
        }
        true
    }

    /// Rows of `child_schema` whose relation points at this row, in the
    /// order the store returns them.
    pub fn children<S>(
        &self,
        store: &S,
        child_schema: &Arc<TableSchema>,
    ) -> Result<Vec<TableRow>, RowError>
    where
        S: RowStore + ?Sized,
    {
        let Some(id) = self.id() else {
            return Ok(Vec::new());
        };
        Ok(store.children_of(child_schema, self.schema.name(), id)?)
    }

    /// Saves the row and adopts the id the store assigned.
    pub fn save<S>(&mut self, store: &mut S) -> Result<RowId, RowError>
    where
        S: RowStore + ?Sized,
    {
        let id = store.save(self)?;
        self.set_id(id);
        Ok(id)
    }

    /// Deletes the row from the store. The in-memory row is unchanged.
    pub fn delete<S>(&self, store: &mut S) -> Result<(), RowError>
    where
        S: RowStore + ?Sized,
    {
        let id = self.id().ok_or_else(|| RowError::NotPersisted {
            table: self.schema.name().to_string(),
        })?;
        store.delete(&self.schema, id)?;
        Ok(())
    }

    fn is_empty_field(&self, column: &ColumnDefinition) -> bool {
        self.get(column.id().as_str())
            .map_or(true, ColumnValue::is_empty)
    }

    fn check_slot(&self, column: &str) -> Result<(), SchemaError> {
        if self.schema.has_slot(column) {
            Ok(())
        } else {
            Err(SchemaError::UnknownColumn {
                table: self.schema.name().to_string(),
                column: column.to_string(),
            })
        }
    }

    pub(crate) fn values(&self) -> &HashMap<ColumnId, ColumnValue> {
        &self.values
    }
}

impl fmt::Debug for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRow")
            .field("table", &self.schema.name())
            .field("values", &self.values)
            .finish()
    }
}

impl fmt::Display for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (column, value) in self.iter() {
            writeln!(f, "Column: {column} {value}")?;
        }
        Ok(())
    }
}

//! User edits: typed input checked against the column, then formulas rerun.

use crate::error::RowError;
use crate::formula::FormulaContext;
use crate::persistence::RowStore;
use crate::selection::Selection;

use super::column::ColumnType;
use super::row::TableRow;
use super::value::ColumnValue;

/// Raw input for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellInput {
    Text(String),
    Choice(Selection),
}

impl From<&str> for CellInput {
    fn from(text: &str) -> Self {
        CellInput::Text(text.to_string())
    }
}

impl From<String> for CellInput {
    fn from(text: String) -> Self {
        CellInput::Text(text)
    }
}

impl From<Selection> for CellInput {
    fn from(selection: Selection) -> Self {
        CellInput::Choice(selection)
    }
}

/// Result of an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Value written and formulas recomputed
    Applied,
    /// Input equal to the current value; nothing done
    Unchanged,
}

impl EditOutcome {
    pub fn is_applied(self) -> bool {
        self == EditOutcome::Applied
    }
}

impl TableRow {
    /// Applies a user edit to an editable column, then recomputes formulas.
    ///
    /// Integer columns take text parsing as `i32`, unsigned integer columns a
    /// non-negative `i32`, picklists a [`Selection`]. Empty text always
    /// passes so a field can be cleared.
    pub fn apply_edit(
        &mut self,
        column: &str,
        input: impl Into<CellInput>,
    ) -> Result<EditOutcome, RowError> {
        self.apply_edit_with(column, input, &FormulaContext::default())
    }

    /// [`apply_edit`](Self::apply_edit) with ancestor rows available to the
    /// recomputed formulas.
    pub fn apply_edit_with(
        &mut self,
        column: &str,
        input: impl Into<CellInput>,
        context: &FormulaContext,
    ) -> Result<EditOutcome, RowError> {
        let definition = self.schema().get_by_id(column)?;
        if !definition.is_editable() {
            return Err(RowError::ReadOnlyColumn {
                column: column.to_string(),
            });
        }
        let column_type = definition.column_type();
        let value = to_value(column, column_type, input.into())?;

        if self.get(column) == Some(&value) {
            return Ok(EditOutcome::Unchanged);
        }

        self.put(column, value)?;
        self.update_formulas_with(context)?;
        Ok(EditOutcome::Applied)
    }

    /// [`apply_edit`](Self::apply_edit), then saves the row when it changed.
    pub fn commit_edit<S>(
        &mut self,
        column: &str,
        input: impl Into<CellInput>,
        store: &mut S,
    ) -> Result<EditOutcome, RowError>
    where
        S: RowStore + ?Sized,
    {
        let outcome = self.apply_edit(column, input)?;
        if outcome.is_applied() {
            self.save(store)?;
        }
        Ok(outcome)
    }
}

fn to_value(column: &str, column_type: ColumnType, input: CellInput) -> Result<ColumnValue, RowError> {
    let invalid = |input: String| RowError::InvalidInput {
        column: column.to_string(),
        expected: column_type.name(),
        input,
    };

    match (column_type, input) {
        (ColumnType::Picklist, CellInput::Choice(selection)) => Ok(ColumnValue::Choice(selection)),
        (ColumnType::Picklist, CellInput::Text(text)) => Err(invalid(text)),
        (_, CellInput::Choice(selection)) => Err(invalid(selection.code().to_string())),
        (_, CellInput::Text(text)) if text.is_empty() || column_type.accepts_text(&text) => {
            Ok(ColumnValue::Text(text))
        }
        (_, CellInput::Text(text)) => Err(invalid(text)),
    }
}

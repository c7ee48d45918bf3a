//! Column definition within a table schema.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::formula::{FormulaSet, HeaderKind};
use crate::selection::{Selection, SelectionList};

use super::row::TableRow;
use super::value::ColumnId;

/// Row-dependent boolean, evaluated against an immutable view of the row.
pub type RowPredicate = Arc<dyn Fn(&TableRow) -> bool + Send + Sync>;

/// Row-dependent source of picklist entries.
pub type PickSource = Arc<dyn Fn(&TableRow) -> SelectionList + Send + Sync>;

/// Value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Integer,
    #[serde(alias = "u_integer")]
    UnsignedInteger,
    Picklist,
    Password,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::UnsignedInteger => "unsigned integer",
            ColumnType::Picklist => "picklist",
            ColumnType::Password => "password",
        }
    }

    /// Whether `input` is acceptable free text for this type.
    ///
    /// Picklists never accept free text.
    pub fn accepts_text(self, input: &str) -> bool {
        match self {
            ColumnType::String | ColumnType::Password => true,
            ColumnType::Integer => input.parse::<i32>().is_ok(),
            ColumnType::UnsignedInteger => input.parse::<i32>().is_ok_and(|n| n >= 0),
            ColumnType::Picklist => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a column must be filled.
#[derive(Clone)]
pub enum Mandatory {
    Always,
    Never,
    When(RowPredicate),
}

impl Mandatory {
    pub fn when(predicate: impl Fn(&TableRow) -> bool + Send + Sync + 'static) -> Self {
        Mandatory::When(Arc::new(predicate))
    }

    pub fn evaluate(&self, row: &TableRow) -> bool {
        match self {
            Mandatory::Always => true,
            Mandatory::Never => false,
            Mandatory::When(predicate) => predicate(row),
        }
    }
}

impl fmt::Debug for Mandatory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mandatory::Always => write!(f, "Always"),
            Mandatory::Never => write!(f, "Never"),
            Mandatory::When(_) => write!(f, "When(<predicate>)"),
        }
    }
}

impl From<bool> for Mandatory {
    fn from(flag: bool) -> Self {
        if flag {
            Mandatory::Always
        } else {
            Mandatory::Never
        }
    }
}

/// Column definition within a table schema.
///
/// Built with chained setters:
///
/// ```
/// use table_row_core::table::{ColumnDefinition, ColumnType};
///
/// let code = ColumnDefinition::new("code", ColumnType::String)
///     .natural_key()
///     .default_code("${id}");
/// assert!(code.is_natural_key());
/// ```
#[derive(Clone)]
pub struct ColumnDefinition {
    id: ColumnId,
    column_type: ColumnType,
    editable: bool,
    mandatory: Mandatory,
    natural_key: bool,
    foreign_key: bool,
    pick_source: Option<PickSource>,
    formulas: FormulaSet,
}

impl ColumnDefinition {
    pub fn new(id: impl Into<ColumnId>, column_type: ColumnType) -> Self {
        Self {
            id: id.into(),
            column_type,
            editable: false,
            mandatory: Mandatory::Never,
            natural_key: false,
            foreign_key: false,
            pick_source: None,
            formulas: FormulaSet::default(),
        }
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn natural_key(mut self) -> Self {
        self.natural_key = true;
        self
    }

    pub fn foreign_key(mut self) -> Self {
        self.foreign_key = true;
        self
    }

    pub fn mandatory(mut self, mandatory: impl Into<Mandatory>) -> Self {
        self.mandatory = mandatory.into();
        self
    }

    pub fn mandatory_when(
        self,
        predicate: impl Fn(&TableRow) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.mandatory(Mandatory::when(predicate))
    }

    pub fn pick_source(
        mut self,
        source: impl Fn(&TableRow) -> SelectionList + Send + Sync + 'static,
    ) -> Self {
        self.pick_source = Some(Arc::new(source));
        self
    }

    /// Fixed picklist, independent of the row.
    pub fn pick_list(self, list: SelectionList) -> Self {
        self.pick_source(move |_| list.clone())
    }

    pub fn formula(mut self, kind: HeaderKind, expression: impl Into<String>) -> Self {
        self.formulas.set(kind, expression);
        self
    }

    pub fn default_code(self, expression: impl Into<String>) -> Self {
        self.formula(HeaderKind::DefaultCode, expression)
    }

    pub fn default_label(self, expression: impl Into<String>) -> Self {
        self.formula(HeaderKind::DefaultLabel, expression)
    }

    pub fn code_formula(self, expression: impl Into<String>) -> Self {
        self.formula(HeaderKind::CodeFormula, expression)
    }

    pub fn label_formula(self, expression: impl Into<String>) -> Self {
        self.formula(HeaderKind::LabelFormula, expression)
    }

    pub fn id(&self) -> &ColumnId {
        &self.id
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_picklist(&self) -> bool {
        self.column_type == ColumnType::Picklist
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn is_natural_key(&self) -> bool {
        self.natural_key
    }

    pub fn is_foreign_key(&self) -> bool {
        self.foreign_key
    }

    pub fn is_mandatory(&self, row: &TableRow) -> bool {
        self.mandatory.evaluate(row)
    }

    pub fn mandatory_rule(&self) -> &Mandatory {
        &self.mandatory
    }

    pub fn formulas(&self) -> &FormulaSet {
        &self.formulas
    }

    pub fn has_pick_source(&self) -> bool {
        self.pick_source.is_some()
    }

    /// Picklist entries for `row`; empty when the column has no source.
    pub fn list(&self, row: &TableRow) -> SelectionList {
        self.pick_source
            .as_ref()
            .map(|source| source(row))
            .unwrap_or_default()
    }

    /// Entries offered when editing `row`: the pick source, plus an empty
    /// selection when the column is optional for that row.
    pub fn choices(&self, row: &TableRow) -> SelectionList {
        let mut list = self.list(row);
        if !self.is_mandatory(row) {
            let empty = Selection::empty();
            if !list.contains(&empty) {
                list.add(empty);
            }
        }
        list
    }
}

impl fmt::Debug for ColumnDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDefinition")
            .field("id", &self.id)
            .field("column_type", &self.column_type)
            .field("editable", &self.editable)
            .field("mandatory", &self.mandatory)
            .field("natural_key", &self.natural_key)
            .field("foreign_key", &self.foreign_key)
            .field("pick_source", &self.pick_source.is_some())
            .field("formulas", &self.formulas)
            .finish()
    }
}

//! Column identifiers, storage ids and typed column values.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::formula::Accessor;
use crate::selection::Selection;

use super::column::ColumnType;

/// Identifier of a column within a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ColumnId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ColumnId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColumnId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ColumnId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&ColumnId> for ColumnId {
    fn from(id: &ColumnId) -> Self {
        id.clone()
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage-assigned row identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value held by one column of one row.
///
/// Non-picklist columns store a single string used as both code and label.
/// Picklist columns store a [`Selection`]: the code is the selection code and
/// the label its description. Equality compares code and label, whatever the
/// variant.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub enum ColumnValue {
    Text(String),
    Choice(Selection),
}

impl ColumnValue {
    pub fn text(text: impl Into<String>) -> Self {
        ColumnValue::Text(text.into())
    }

    pub fn choice(selection: Selection) -> Self {
        ColumnValue::Choice(selection)
    }

    /// Empty value of the variant matching `column_type`.
    pub fn empty_for(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Picklist => ColumnValue::Choice(Selection::empty()),
            _ => ColumnValue::Text(String::new()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ColumnValue::Text(text) => text,
            ColumnValue::Choice(selection) => selection.code(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ColumnValue::Text(text) => text,
            ColumnValue::Choice(selection) => selection.description(),
        }
    }

    pub fn get(&self, accessor: Accessor) -> &str {
        match accessor {
            Accessor::Code => self.code(),
            Accessor::Label => self.label(),
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            ColumnValue::Choice(selection) => Some(selection),
            ColumnValue::Text(_) => None,
        }
    }

    /// A value is empty when its label is empty.
    pub fn is_empty(&self) -> bool {
        self.label().is_empty()
    }

    /// Writes one half of the value. Text values keep code and label equal.
    pub fn set(&mut self, accessor: Accessor, text: impl Into<String>) {
        let text = text.into();
        match self {
            ColumnValue::Text(current) => *current = text,
            ColumnValue::Choice(selection) => {
                *selection = match accessor {
                    Accessor::Code => Selection::new(text, selection.description()),
                    Accessor::Label => Selection::new(selection.code(), text),
                };
            }
        }
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.set(Accessor::Code, code);
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.set(Accessor::Label, label);
    }
}

impl PartialEq for ColumnValue {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code() && self.label() == other.label()
    }
}

impl From<Selection> for ColumnValue {
    fn from(selection: Selection) -> Self {
        ColumnValue::Choice(selection)
    }
}

impl From<&str> for ColumnValue {
    fn from(text: &str) -> Self {
        ColumnValue::text(text)
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={};value={}", self.code(), self.label())
    }
}

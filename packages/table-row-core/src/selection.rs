//! Picklist entries and ordered, code-unique lists of them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One allowed value of a controlled vocabulary.
///
/// An empty selection (both fields empty) is a real value, distinct from
/// the absence of a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    code: String,
    description: String,
}

impl Selection {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }

    /// The empty selection offered for optional picklist columns.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty() && self.description.is_empty()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.code)
    }
}

/// Ordered sequence of selections with unique codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Selection>", into = "Vec<Selection>")]
pub struct SelectionList {
    selections: Vec<Selection>,
}

impl SelectionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `selection` unless an entry with the same code exists.
    ///
    /// Returns `true` if the selection was inserted.
    pub fn add(&mut self, selection: Selection) -> bool {
        if self.get(selection.code()).is_some() {
            return false;
        }
        self.selections.push(selection);
        true
    }

    /// Structural membership test (code and description).
    pub fn contains(&self, selection: &Selection) -> bool {
        self.selections.iter().any(|s| s == selection)
    }

    /// Looks up the entry carrying `code`.
    pub fn get(&self, code: &str) -> Option<&Selection> {
        self.selections.iter().find(|s| s.code() == code)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Selection> {
        self.selections.iter()
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

impl FromIterator<Selection> for SelectionList {
    fn from_iter<I: IntoIterator<Item = Selection>>(iter: I) -> Self {
        let mut list = SelectionList::new();
        for selection in iter {
            list.add(selection);
        }
        list
    }
}

impl From<Vec<Selection>> for SelectionList {
    fn from(selections: Vec<Selection>) -> Self {
        selections.into_iter().collect()
    }
}

impl From<SelectionList> for Vec<Selection> {
    fn from(list: SelectionList) -> Self {
        list.selections
    }
}

impl<'a> IntoIterator for &'a SelectionList {
    type Item = &'a Selection;
    type IntoIter = std::slice::Iter<'a, Selection>;

    fn into_iter(self) -> Self::IntoIter {
        self.selections.iter()
    }
}

impl IntoIterator for SelectionList {
    type Item = Selection;
    type IntoIter = std::vec::IntoIter<Selection>;

    fn into_iter(self) -> Self::IntoIter {
        self.selections.into_iter()
    }
}

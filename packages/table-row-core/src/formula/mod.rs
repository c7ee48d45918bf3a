//! Formula engine for default and derived column values.
//!
//! Each column may declare four expressions, one per [`HeaderKind`]. The
//! default kinds seed a fresh row in [`TableRow::initialize`]; the formula
//! kinds recompute derived columns in [`TableRow::update_formulas`].
//! Expressions are templates over column references, see [`expression`].
//!
//! [`TableRow::initialize`]: crate::table::TableRow::initialize
//! [`TableRow::update_formulas`]: crate::table::TableRow::update_formulas

mod context;
pub mod expression;
mod solver;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::ColumnId;

pub use context::FormulaContext;
pub use expression::{Expression, Reference, Segment};
pub(crate) use expression::is_identifier;
pub use solver::FormulaSolver;

#[cfg(feature = "parallel")]
pub use solver::update_all_parallel;

/// Part of a column value a formula reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessor {
    Code,
    Label,
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Code => write!(f, "code"),
            Accessor::Label => write!(f, "label"),
        }
    }
}

/// Which of a column's expressions is being solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    DefaultCode,
    DefaultLabel,
    CodeFormula,
    LabelFormula,
}

impl HeaderKind {
    pub const ALL: [HeaderKind; 4] = [
        HeaderKind::DefaultCode,
        HeaderKind::DefaultLabel,
        HeaderKind::CodeFormula,
        HeaderKind::LabelFormula,
    ];

    /// Metadata header carrying the expression.
    pub fn header_name(self) -> &'static str {
        match self {
            HeaderKind::DefaultCode => "default_code",
            HeaderKind::DefaultLabel => "default_label",
            HeaderKind::CodeFormula => "code_formula",
            HeaderKind::LabelFormula => "label_formula",
        }
    }

    /// Case-insensitive lookup by header name.
    pub fn from_header_name(name: &str) -> Option<Self> {
        HeaderKind::ALL
            .into_iter()
            .find(|kind| kind.header_name().eq_ignore_ascii_case(name))
    }

    /// Part of the column value the solved text is written to.
    pub fn target(self) -> Accessor {
        match self {
            HeaderKind::DefaultCode | HeaderKind::CodeFormula => Accessor::Code,
            HeaderKind::DefaultLabel | HeaderKind::LabelFormula => Accessor::Label,
        }
    }

    /// Default kinds run once on a fresh row.
    pub fn is_default(self) -> bool {
        matches!(self, HeaderKind::DefaultCode | HeaderKind::DefaultLabel)
    }

    /// The kind writing the other half of the same value.
    pub fn counterpart(self) -> Self {
        match self {
            HeaderKind::DefaultCode => HeaderKind::DefaultLabel,
            HeaderKind::DefaultLabel => HeaderKind::DefaultCode,
            HeaderKind::CodeFormula => HeaderKind::LabelFormula,
            HeaderKind::LabelFormula => HeaderKind::CodeFormula,
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_name())
    }
}

/// Formula resolution errors. A failed formula leaves the column untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("Malformed formula '{expression}' at byte {position}: {reason}")]
    Malformed {
        expression: String,
        position: usize,
        reason: &'static str,
    },

    #[error("Cyclic formula reference: {path}")]
    Cycle { path: String },

    #[error("Formula on column '{column}' references unknown column '{reference}'")]
    UnknownColumn { column: String, reference: String },

    #[error("Formula on column '{column}' references table '{table}', which is not an ancestor of the row")]
    MissingAncestor { column: String, table: String },

    #[error("Formula on column '{column}' depends on '{dependency}', which failed to resolve")]
    DependencyFailed { column: String, dependency: String },
}

/// One solved expression of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    column: ColumnId,
    kind: HeaderKind,
    expression: String,
    solved: String,
}

impl Formula {
    pub fn new(
        column: ColumnId,
        kind: HeaderKind,
        expression: impl Into<String>,
        solved: impl Into<String>,
    ) -> Self {
        Self {
            column,
            kind,
            expression: expression.into(),
            solved: solved.into(),
        }
    }

    pub fn column(&self) -> &ColumnId {
        &self.column
    }

    pub fn kind(&self) -> HeaderKind {
        self.kind
    }

    /// Raw expression as declared in metadata.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn solved(&self) -> &str {
        &self.solved
    }
}

/// Raw expressions declared for one column, one per [`HeaderKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaSet {
    #[serde(default)]
    pub default_code: String,
    #[serde(default)]
    pub default_label: String,
    #[serde(default)]
    pub code_formula: String,
    #[serde(default)]
    pub label_formula: String,
}

impl FormulaSet {
    pub fn get(&self, kind: HeaderKind) -> &str {
        match kind {
            HeaderKind::DefaultCode => &self.default_code,
            HeaderKind::DefaultLabel => &self.default_label,
            HeaderKind::CodeFormula => &self.code_formula,
            HeaderKind::LabelFormula => &self.label_formula,
        }
    }

    pub fn set(&mut self, kind: HeaderKind, expression: impl Into<String>) {
        let slot = match kind {
            HeaderKind::DefaultCode => &mut self.default_code,
            HeaderKind::DefaultLabel => &mut self.default_label,
            HeaderKind::CodeFormula => &mut self.code_formula,
            HeaderKind::LabelFormula => &mut self.label_formula,
        };
        *slot = expression.into();
    }

    pub fn has(&self, kind: HeaderKind) -> bool {
        !self.get(kind).trim().is_empty()
    }
}

/// Whether a solved predicate formula reads as true.
pub fn is_truthy(solved: &str) -> bool {
    matches!(
        solved.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "1"
    )
}

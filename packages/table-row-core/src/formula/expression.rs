//! Parser for the formula template language.
//!
//! Grammar:
//!
//! ```text
//! expression := (literal | "$$" | reference)*
//! reference  := "${" [table "."] column [":" ("code" | "label")] "}"
//! ```
//!
//! A `$` not followed by `{` or `$` is literal text.

use std::fmt;
use std::str::FromStr;

use super::{Accessor, FormulaError};
use crate::table::ColumnId;

/// Reference to a column, either on the evaluated row or on an ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Ancestor table name, `None` for the evaluated row
    pub table: Option<String>,
    pub column: ColumnId,
    /// Explicit accessor, `None` to follow the header kind
    pub accessor: Option<Accessor>,
}

impl Reference {
    /// Whether the reference reads the evaluated row of table `table`.
    pub fn is_local_to(&self, table: &str) -> bool {
        self.table.as_deref().map_or(true, |t| t == table)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{")?;
        if let Some(table) = &self.table {
            write!(f, "{table}.")?;
        }
        write!(f, "{}", self.column)?;
        if let Some(accessor) = self.accessor {
            write!(f, ":{accessor}")?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Reference(Reference),
}

/// Parsed formula expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expression {
    segments: Vec<Segment>,
}

impl Expression {
    /// Parses `raw`. An empty string yields an empty expression.
    pub fn parse(raw: &str) -> Result<Self, FormulaError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }
            match chars.peek() {
                Some((_, '$')) => {
                    chars.next();
                    literal.push('$');
                }
                Some((_, '{')) => {
                    chars.next();
                    let mut body = String::new();
                    let mut closed = false;
                    for (inner_pos, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' | '$' => {
                                return Err(malformed(raw, inner_pos, "nested reference"));
                            }
                            _ => body.push(inner),
                        }
                    }
                    if !closed {
                        return Err(malformed(raw, pos, "unterminated reference"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Reference(parse_reference(raw, pos, &body)?));
                }
                _ => literal.push('$'),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// References in order of appearance.
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Reference(reference) => Some(reference),
            Segment::Literal(_) => None,
        })
    }
}

impl FromStr for Expression {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

fn parse_reference(raw: &str, pos: usize, body: &str) -> Result<Reference, FormulaError> {
    let (path, accessor) = match body.split_once(':') {
        Some((path, accessor)) => {
            let accessor = match accessor.trim().to_ascii_lowercase().as_str() {
                "code" => Accessor::Code,
                "label" => Accessor::Label,
                _ => return Err(malformed(raw, pos, "unknown accessor")),
            };
            (path, Some(accessor))
        }
        None => (body, None),
    };

    let mut parts = path.split('.').map(str::trim);
    let first = parts.next().unwrap_or_default();
    let second = parts.next();
    if parts.next().is_some() {
        return Err(malformed(raw, pos, "too many qualifiers"));
    }

    let (table, column) = match second {
        Some(column) => (Some(first), column),
        None => (None, first),
    };

    if column.is_empty() || table.is_some_and(str::is_empty) {
        return Err(malformed(raw, pos, "empty name"));
    }
    if !is_identifier(column) || !table.map_or(true, is_identifier) {
        return Err(malformed(raw, pos, "invalid character in name"));
    }

    Ok(Reference {
        table: table.map(str::to_string),
        column: ColumnId::from(column),
        accessor,
    })
}

/// Non-empty run of alphanumerics, `_` and `-`.
pub(crate) fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn malformed(raw: &str, position: usize, reason: &'static str) -> FormulaError {
    FormulaError::Malformed {
        expression: raw.to_string(),
        position,
        reason,
    }
}

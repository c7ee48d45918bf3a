//! Validation methods for table schemas.

use std::collections::HashSet;

use super::column::ColumnDefinition;
use super::relation::Relation;
use super::value::ColumnId;
use crate::error::SchemaError;
use crate::formula::{is_identifier, Expression, HeaderKind};

/// Validates that the table name is an identifier usable in `${table.column}`.
pub(crate) fn validate_table_name(table: &str) -> Result<(), SchemaError> {
    if is_identifier(table) {
        Ok(())
    } else {
        Err(SchemaError::InvalidTableName(table.to_string()))
    }
}

/// Validates that column ids are unique.
///
/// # Arguments
/// * `table` - Table name, for error reporting
/// * `columns` - Column definitions to validate
///
/// # Returns
/// `Result<(), SchemaError>` indicating success or validation failure.
pub(crate) fn validate_unique_columns(
    table: &str,
    columns: &[ColumnDefinition],
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.id()) {
            return Err(SchemaError::DuplicateColumn {
                table: table.to_string(),
                column: column.id().to_string(),
            });
        }
    }
    Ok(())
}

/// Validates that the version column, if any, is a declared column.
pub(crate) fn validate_version_column(
    table: &str,
    columns: &[ColumnDefinition],
    version_column: Option<&ColumnId>,
) -> Result<(), SchemaError> {
    match version_column {
        Some(version) if !columns.iter().any(|c| c.id() == version) => {
            Err(SchemaError::UnknownVersionColumn {
                table: table.to_string(),
                column: version.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Validates that every formula parses and that unqualified references name
/// a declared column or the id column.
///
/// Qualified references point at other tables and are checked by whoever
/// knows the full set of tables.
pub(crate) fn validate_formulas(
    table: &str,
    columns: &[ColumnDefinition],
    id_column: &ColumnId,
) -> Result<(), SchemaError> {
    let known = |id: &ColumnId| id == id_column || columns.iter().any(|c| c.id() == id);

    for column in columns {
        for kind in HeaderKind::ALL {
            let expression = Expression::parse(column.formulas().get(kind)).map_err(|source| {
                SchemaError::InvalidFormula {
                    table: table.to_string(),
                    column: column.id().to_string(),
                    header: kind.header_name(),
                    source,
                }
            })?;

            let unknown = expression
                .references()
                .filter(|r| r.is_local_to(table))
                .find(|r| !known(&r.column));
            if let Some(unknown) = unknown {
                return Err(SchemaError::UnknownReference {
                    table: table.to_string(),
                    column: column.id().to_string(),
                    reference: unknown.column.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Validates that each relation goes through a declared foreign-key column
/// and points at another table.
pub(crate) fn validate_relations(
    table: &str,
    columns: &[ColumnDefinition],
    relations: &[Relation],
) -> Result<(), SchemaError> {
    let invalid = |relation: &Relation, reason| SchemaError::InvalidRelation {
        table: table.to_string(),
        parent: relation.parent_table().to_string(),
        column: relation.foreign_key().to_string(),
        reason,
    };

    let mut parents = HashSet::new();
    for relation in relations {
        if relation.parent_table() == table {
            return Err(invalid(relation, "a table cannot be its own parent"));
        }
        if !parents.insert(relation.parent_table()) {
            return Err(invalid(relation, "duplicate relation to the same parent"));
        }
        match columns.iter().find(|c| c.id() == relation.foreign_key()) {
            None => return Err(invalid(relation, "foreign key column not declared")),
            Some(column) if !column.is_foreign_key() => {
                return Err(invalid(relation, "column is not flagged as a foreign key"))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

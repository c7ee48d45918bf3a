//! Formula resolution over one row.

use std::collections::HashMap;
use std::sync::Arc;

use super::context::FormulaContext;
use super::expression::{Expression, Reference, Segment};
use super::{Accessor, Formula, FormulaError, HeaderKind};
use crate::table::{ColumnDefinition, ColumnId, TableRow, TableSchema};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Resolving,
    Done,
    Failed,
}

/// Bookkeeping for one `solve_all` pass.
struct Pass {
    kind: HeaderKind,
    states: HashMap<ColumnId, State>,
    stack: Vec<ColumnId>,
}

impl Pass {
    fn new(kind: HeaderKind) -> Self {
        Self {
            kind,
            states: HashMap::new(),
            stack: Vec::new(),
        }
    }

    fn cycle_path(&self, reentered: &ColumnId) -> String {
        let start = self
            .stack
            .iter()
            .position(|id| id == reentered)
            .unwrap_or(0);
        self.stack[start..]
            .iter()
            .chain(std::iter::once(reentered))
            .map(ColumnId::as_str)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Whether `column` takes part in a pass of `kind`.
///
/// Default passes seed every column but foreign keys, which the caller fills
/// through relations. Formula passes never touch editable columns, which
/// hold user input.
fn participates(column: &ColumnDefinition, kind: HeaderKind) -> bool {
    if kind.is_default() {
        !column.is_foreign_key()
    } else {
        !column.is_editable()
    }
}

/// Evaluates column formulas against a row and its [`FormulaContext`].
#[derive(Debug, Clone, Copy)]
pub struct FormulaSolver<'c> {
    context: &'c FormulaContext,
}

impl<'c> FormulaSolver<'c> {
    pub fn new(context: &'c FormulaContext) -> Self {
        Self { context }
    }

    /// Solves the `kind` expression of `column` against the current values
    /// of `row`, without modifying it.
    pub fn solve(
        &self,
        row: &TableRow,
        column: &ColumnDefinition,
        kind: HeaderKind,
    ) -> Result<Formula, FormulaError> {
        let raw = column.formulas().get(kind);
        let expression = Expression::parse(raw)?;
        let solved = self.evaluate(row, column.id().as_str(), &expression, kind.target())?;
        Ok(Formula::new(column.id().clone(), kind, raw, solved))
    }

    /// Substitutes every reference of `expression`.
    ///
    /// Unqualified references read `row`; missing values read as empty.
    /// `owner` names the column the expression belongs to, for errors.
    pub fn evaluate(
        &self,
        row: &TableRow,
        owner: &str,
        expression: &Expression,
        default_accessor: Accessor,
    ) -> Result<String, FormulaError> {
        let mut solved = String::new();
        for segment in expression.segments() {
            match segment {
                Segment::Literal(text) => solved.push_str(text),
                Segment::Reference(reference) => {
                    solved.push_str(self.lookup(row, owner, reference, default_accessor)?)
                }
            }
        }
        Ok(solved)
    }

    fn lookup<'r>(
        &'r self,
        row: &'r TableRow,
        owner: &str,
        reference: &Reference,
        default_accessor: Accessor,
    ) -> Result<&'r str, FormulaError> {
        let source = if reference.is_local_to(row.schema().name()) {
            row
        } else {
            let table = reference.table.as_deref().unwrap_or_default();
            self.context
                .ancestor(table)
                .ok_or_else(|| FormulaError::MissingAncestor {
                    column: owner.to_string(),
                    table: table.to_string(),
                })?
        };

        if !source.schema().has_slot(reference.column.as_str()) {
            return Err(FormulaError::UnknownColumn {
                column: owner.to_string(),
                reference: reference.to_string(),
            });
        }

        let accessor = reference.accessor.unwrap_or(default_accessor);
        Ok(source
            .get(reference.column.as_str())
            .map_or("", |value| value.get(accessor)))
    }

    /// Solves the `kind` expression of every column in declared order and
    /// writes each result into `row`.
    ///
    /// A reference to a column whose own expression of the same kind has not
    /// run yet in this pass resolves that column first. A failing formula
    /// leaves its column untouched and does not stop the pass; the first
    /// error is returned once every column has been visited.
    pub fn solve_all(&self, row: &mut TableRow, kind: HeaderKind) -> Result<(), FormulaError> {
        let schema = Arc::clone(row.schema());
        let mut pass = Pass::new(kind);
        let mut first_error = None;

        for column in schema.columns() {
            if !participates(column, kind) || pass.states.contains_key(column.id()) {
                continue;
            }
            if let Err(err) = self.resolve(row, &schema, column, &mut pass) {
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn resolve(
        &self,
        row: &mut TableRow,
        schema: &TableSchema,
        column: &ColumnDefinition,
        pass: &mut Pass,
    ) -> Result<(), FormulaError> {
        pass.states.insert(column.id().clone(), State::Resolving);
        pass.stack.push(column.id().clone());

        let result = self.resolve_dependencies_and_apply(row, schema, column, pass);

        pass.stack.pop();
        let state = if result.is_ok() {
            State::Done
        } else {
            State::Failed
        };
        pass.states.insert(column.id().clone(), state);

        if let Err(err) = &result {
            tracing::warn!(
                table = schema.name(),
                column = %column.id(),
                header = %pass.kind,
                error = %err,
                "formula not applied"
            );
        }
        result
    }

    fn resolve_dependencies_and_apply(
        &self,
        row: &mut TableRow,
        schema: &TableSchema,
        column: &ColumnDefinition,
        pass: &mut Pass,
    ) -> Result<(), FormulaError> {
        let kind = pass.kind;
        let raw = column.formulas().get(kind);
        let expression = Expression::parse(raw)?;
        if expression.is_empty() {
            return Ok(());
        }

        for reference in expression.references() {
            let accessor = reference.accessor.unwrap_or(kind.target());
            if !reference.is_local_to(schema.name()) || accessor != kind.target() {
                continue;
            }
            // The id column may be undeclared; it is never derived.
            let Some(dependency) = schema.find(reference.column.as_str()) else {
                continue;
            };
            if !participates(dependency, kind) || !dependency.formulas().has(kind) {
                continue;
            }

            let dependency_failed = || FormulaError::DependencyFailed {
                column: column.id().to_string(),
                dependency: dependency.id().to_string(),
            };
            match pass.states.get(dependency.id()).copied() {
                Some(State::Done) => {}
                Some(State::Resolving) => {
                    return Err(FormulaError::Cycle {
                        path: pass.cycle_path(dependency.id()),
                    })
                }
                Some(State::Failed) => return Err(dependency_failed()),
                None => match self.resolve(row, schema, dependency, pass) {
                    Ok(()) => {}
                    Err(err @ FormulaError::Cycle { .. }) => return Err(err),
                    Err(_) => return Err(dependency_failed()),
                },
            }
        }

        let solved = self.evaluate(row, column.id().as_str(), &expression, kind.target())?;
        let formula = Formula::new(column.id().clone(), kind, raw, solved);
        row.apply_formula(column, &formula);
        Ok(())
    }
}

/// Recomputes the formulas of every row, spreading rows across threads.
///
/// Each row only reads its own values. Every row is processed; the first
/// error, if any, is returned.
#[cfg(feature = "parallel")]
pub fn update_all_parallel(rows: &mut [TableRow]) -> Result<(), crate::error::RowError> {
    rows.par_iter_mut()
        .map(TableRow::update_formulas)
        .collect::<Vec<_>>()
        .into_iter()
        .find_map(Result::err)
        .map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ColumnType, Relation};

    fn text(id: &str) -> ColumnDefinition {
        ColumnDefinition::new(id, ColumnType::String)
    }

    #[test]
    fn test_solve_reads_current_values() {
        let schema = Arc::new(
            TableSchema::builder("sample")
                .column(text("name").editable())
                .column(text("greeting").code_formula("Hello, ${name}!"))
                .build()
                .unwrap(),
        );
        let mut row = TableRow::new(schema.clone());
        row.put_text("name", "Ada").unwrap();

        let context = FormulaContext::new();
        let solver = FormulaSolver::new(&context);
        let column = schema.get_by_id("greeting").unwrap();
        let formula = solver.solve(&row, column, HeaderKind::CodeFormula).unwrap();

        assert_eq!(formula.solved(), "Hello, Ada!");
        assert_eq!(formula.expression(), "Hello, ${name}!");
        assert!(row.get("greeting").is_none(), "solve must not write");
    }

    #[test]
    fn test_empty_expression_solves_to_empty() {
        let schema = Arc::new(TableSchema::builder("sample").column(text("a")).build().unwrap());
        let row = TableRow::new(schema.clone());
        let context = FormulaContext::new();
        let formula = FormulaSolver::new(&context)
            .solve(&row, schema.get_by_id("a").unwrap(), HeaderKind::LabelFormula)
            .unwrap();
        assert_eq!(formula.solved(), "");
    }

    #[test]
    fn test_forward_reference_resolves_on_demand() {
        let schema = Arc::new(
            TableSchema::builder("sample")
                .column(text("first").code_formula("${second}-A"))
                .column(text("second").code_formula("${source}B"))
                .column(text("source").editable())
                .build()
                .unwrap(),
        );
        let mut row = TableRow::new(schema);
        row.put_text("source", "x").unwrap();

        let context = FormulaContext::new();
        FormulaSolver::new(&context)
            .solve_all(&mut row, HeaderKind::CodeFormula)
            .unwrap();

        assert_eq!(row.get("second").unwrap().code(), "xB");
        assert_eq!(row.get("first").unwrap().code(), "xB-A");
    }

    #[test]
    fn test_cycle_is_reported_and_values_untouched() {
        let schema = Arc::new(
            TableSchema::builder("sample")
                .column(text("a").code_formula("${b}"))
                .column(text("b").code_formula("${a}"))
                .column(text("c").code_formula("fixed"))
                .build()
                .unwrap(),
        );
        let mut row = TableRow::new(schema);
        row.put_text("a", "old-a").unwrap();
        row.put_text("b", "old-b").unwrap();

        let context = FormulaContext::new();
        let err = FormulaSolver::new(&context)
            .solve_all(&mut row, HeaderKind::CodeFormula)
            .unwrap_err();

        assert_eq!(
            err,
            FormulaError::Cycle {
                path: "a -> b -> a".to_string()
            }
        );
        assert_eq!(row.get("a").unwrap().code(), "old-a");
        assert_eq!(row.get("b").unwrap().code(), "old-b");
        // Unrelated formulas still run.
        assert_eq!(row.get("c").unwrap().code(), "fixed");
    }

    #[test]
    fn test_self_reference_on_other_accessor_is_not_a_cycle() {
        let schema = Arc::new(
            TableSchema::builder("sample")
                .column(
                    ColumnDefinition::new("kind", ColumnType::Picklist)
                        .code_formula("K1")
                        .label_formula("Kind ${kind:code}"),
                )
                .build()
                .unwrap(),
        );
        let mut row = TableRow::new(schema);
        row.update_formulas().unwrap();
        let value = row.get("kind").unwrap();
        assert_eq!(value.code(), "K1");
        assert_eq!(value.label(), "Kind K1");
    }

    #[test]
    fn test_dependency_failure_propagates() {
        let schema = Arc::new(
            TableSchema::builder("sample")
                .column(text("a").code_formula("${b}!"))
                .column(text("b").code_formula("${report.year}"))
                .build()
                .unwrap(),
        );
        let mut row = TableRow::new(schema);
        let context = FormulaContext::new();
        let err = FormulaSolver::new(&context)
            .solve_all(&mut row, HeaderKind::CodeFormula)
            .unwrap_err();

        assert_eq!(
            err,
            FormulaError::DependencyFailed {
                column: "a".to_string(),
                dependency: "b".to_string()
            }
        );
        assert!(row.get("a").is_none());
    }

    #[test]
    fn test_ancestor_reference_reads_context() {
        let report = Arc::new(
            TableSchema::builder("report")
                .column(text("year").editable())
                .build()
                .unwrap(),
        );
        let sample = Arc::new(
            TableSchema::builder("sample")
                .column(text("report_id").foreign_key())
                .column(text("label").code_formula("${report.year}/${report.id}"))
                .relation(Relation::new("report", "report_id"))
                .build()
                .unwrap(),
        );

        let mut parent = TableRow::new(report);
        parent.put_text("year", "2024").unwrap();
        parent.set_id(crate::table::RowId(12));

        let context = FormulaContext::new().with_ancestor(parent);
        let mut row = TableRow::new(sample);
        row.update_formulas_with(&context).unwrap();

        assert_eq!(row.get("label").unwrap().code(), "2024/12");
    }

    #[test]
    fn test_missing_ancestor() {
        let schema = Arc::new(
            TableSchema::builder("sample")
                .column(text("label").code_formula("${report.year}"))
                .build()
                .unwrap(),
        );
        let mut row = TableRow::new(schema);
        let err = row.update_formulas().unwrap_err();
        assert!(matches!(
            err,
            crate::error::RowError::Formula(FormulaError::MissingAncestor { ref table, .. }) if table == "report"
        ));
    }

    #[test]
    fn test_ancestor_unknown_column() {
        let report = Arc::new(TableSchema::builder("report").build().unwrap());
        let schema = Arc::new(
            TableSchema::builder("sample")
                .column(text("label").code_formula("${report.nope}"))
                .build()
                .unwrap(),
        );
        let context = FormulaContext::new().with_ancestor(TableRow::new(report));
        let mut row = TableRow::new(schema);
        let err = FormulaSolver::new(&context)
            .solve_all(&mut row, HeaderKind::CodeFormula)
            .unwrap_err();
        assert!(matches!(err, FormulaError::UnknownColumn { .. }));
    }
}

//! JSON catalog: the reference [`MetadataSource`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{CatalogError, SchemaError};
use crate::formula::{is_truthy, Accessor, Expression, FormulaContext, FormulaSolver, Segment};
use crate::selection::SelectionList;
use crate::table::{ColumnDefinition, Mandatory, TableRow, TableSchema};

use super::document::{
    CatalogDocument, ColumnDocument, MandatoryDocument, TableDocument, CATALOG_VERSION,
};
use super::MetadataSource;

type Lists = Arc<BTreeMap<String, SelectionList>>;

/// Schemas and selection lists loaded from a catalog document.
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: Vec<Arc<TableSchema>>,
    by_name: HashMap<String, usize>,
    lists: Lists,
}

impl Catalog {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Validates `document` and builds its schemas.
    ///
    /// Besides the per-table checks of [`TableSchema::create`], every
    /// relation must point at a catalog table, every qualified formula
    /// reference at an ancestor table, and every static picklist at a
    /// declared list. Mandatory and picklist formulas may only read the
    /// row itself.
    pub fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        if document.version != CATALOG_VERSION {
            return Err(CatalogError::UnsupportedVersion(document.version));
        }

        let mut by_name = HashMap::new();
        for (index, table) in document.tables.iter().enumerate() {
            if by_name.insert(table.name.clone(), index).is_some() {
                return Err(CatalogError::DuplicateTable(table.name.clone()));
            }
        }

        for table in &document.tables {
            for relation in &table.relations {
                if !by_name.contains_key(relation.parent_table()) {
                    return Err(SchemaError::UnknownTable(relation.parent_table().to_string()).into());
                }
            }
        }

        for table in &document.tables {
            validate_references(table, &document.tables, &by_name)?;
        }

        let lists: Lists = Arc::new(
            document
                .lists
                .into_iter()
                .map(|(name, list)| (name, list.into_iter().collect::<SelectionList>()))
                .collect(),
        );

        let tables = document
            .tables
            .into_iter()
            .map(|table| build_schema(table, &lists).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(tables = tables.len(), lists = lists.len(), "catalog loaded");
        Ok(Self {
            tables,
            by_name,
            lists,
        })
    }

    /// Schemas in declaration order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableSchema>> {
        self.tables.iter()
    }

    pub fn lists(&self) -> impl Iterator<Item = (&str, &SelectionList)> {
        self.lists.iter().map(|(name, list)| (name.as_str(), list))
    }
}

impl MetadataSource for Catalog {
    fn schema(&self, table: &str) -> Option<Arc<TableSchema>> {
        self.by_name
            .get(table)
            .map(|&index| Arc::clone(&self.tables[index]))
    }

    fn selection_list(&self, name: &str) -> Option<SelectionList> {
        self.lists.get(name).cloned()
    }
}

/// Every expression a column carries, keyed by the attribute holding it.
fn column_expressions(column: &ColumnDocument) -> Vec<(&'static str, &str)> {
    let mut expressions = vec![
        ("default_code", column.default_code.as_str()),
        ("default_label", column.default_label.as_str()),
        ("code_formula", column.code_formula.as_str()),
        ("label_formula", column.label_formula.as_str()),
    ];
    if let MandatoryDocument::Formula(formula) = &column.mandatory {
        expressions.push(("mandatory", formula.as_str()));
    }
    if let Some(picklist) = &column.picklist {
        expressions.push(("picklist", picklist.as_str()));
    }
    expressions
}

/// Headers solved against the row alone, without its ancestors.
fn is_row_rule(header: &str) -> bool {
    matches!(header, "mandatory" | "picklist")
}

fn parse(
    table: &str,
    column: &ColumnDocument,
    header: &'static str,
    raw: &str,
) -> Result<Expression, SchemaError> {
    Expression::parse(raw).map_err(|source| SchemaError::InvalidFormula {
        table: table.to_string(),
        column: column.id.to_string(),
        header,
        source,
    })
}

fn declares(table: &TableDocument, column: &str) -> bool {
    table.id_column.as_str() == column || table.columns.iter().any(|c| c.id.as_str() == column)
}

/// Tables reachable from `table` by following relations upward.
fn ancestors<'a>(
    table: &'a TableDocument,
    tables: &'a [TableDocument],
    by_name: &HashMap<String, usize>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut pending = vec![table];
    while let Some(current) = pending.pop() {
        for relation in &current.relations {
            let parent = relation.parent_table();
            if parent == table.name || !seen.insert(parent) {
                continue;
            }
            if let Some(&index) = by_name.get(parent) {
                pending.push(&tables[index]);
            }
        }
    }
    seen
}

fn validate_references(
    table: &TableDocument,
    tables: &[TableDocument],
    by_name: &HashMap<String, usize>,
) -> Result<(), CatalogError> {
    let reachable = ancestors(table, tables, by_name);

    for column in &table.columns {
        for (header, raw) in column_expressions(column) {
            let expression = parse(&table.name, column, header, raw)?;
            for reference in expression.references() {
                if is_row_rule(header) && !reference.is_local_to(&table.name) {
                    return Err(CatalogError::AncestorInRowRule {
                        table: table.name.clone(),
                        column: column.id.to_string(),
                        header,
                        reference: reference.to_string(),
                    });
                }
                let target = match reference.table.as_deref() {
                    None => table,
                    Some(name) if name == table.name => table,
                    Some(name) if reachable.contains(name) => &tables[by_name[name]],
                    Some(name) => {
                        return Err(CatalogError::UnreachableAncestor {
                            table: table.name.clone(),
                            column: column.id.to_string(),
                            ancestor: name.to_string(),
                        })
                    }
                };
                if !declares(target, reference.column.as_str()) {
                    return Err(SchemaError::UnknownReference {
                        table: table.name.clone(),
                        column: column.id.to_string(),
                        reference: reference.to_string(),
                    }
                    .into());
                }
            }
        }
    }
    Ok(())
}

fn build_schema(table: TableDocument, lists: &Lists) -> Result<TableSchema, CatalogError> {
    let mut builder = TableSchema::builder(table.name.as_str()).id_column(table.id_column);
    if let Some(version_column) = table.version_column {
        builder = builder.version_column(version_column);
    }
    for relation in table.relations {
        builder = builder.relation(relation);
    }
    for column in &table.columns {
        builder = builder.column(build_column(&table.name, column, lists)?);
    }
    Ok(builder.build()?)
}

fn build_column(
    table: &str,
    document: &ColumnDocument,
    lists: &Lists,
) -> Result<ColumnDefinition, CatalogError> {
    let mut column = ColumnDefinition::new(document.id.clone(), document.column_type)
        .default_code(document.default_code.as_str())
        .default_label(document.default_label.as_str())
        .code_formula(document.code_formula.as_str())
        .label_formula(document.label_formula.as_str());
    if document.editable {
        column = column.editable();
    }
    if document.natural_key {
        column = column.natural_key();
    }
    if document.foreign_key {
        column = column.foreign_key();
    }

    column = match &document.mandatory {
        MandatoryDocument::Flag(flag) => column.mandatory(*flag),
        MandatoryDocument::Formula(raw) => {
            let expression = parse(table, document, "mandatory", raw)?;
            column.mandatory(mandatory_formula(document.id.to_string(), expression))
        }
    };

    if let Some(raw) = &document.picklist {
        let expression = parse(table, document, "picklist", raw)?;
        column = if expression.references().next().is_none() {
            let name = literal_text(&expression);
            let list = lists.get(&name).ok_or_else(|| CatalogError::UnknownList {
                table: table.to_string(),
                column: document.id.to_string(),
                list: name.clone(),
            })?;
            column.pick_list(list.clone())
        } else {
            column.pick_source(list_formula(document.id.to_string(), expression, lists))
        };
    }

    Ok(column)
}

fn literal_text(expression: &Expression) -> String {
    expression
        .segments()
        .iter()
        .filter_map(|segment| match segment {
            Segment::Literal(text) => Some(text.as_str()),
            Segment::Reference(_) => None,
        })
        .collect()
}

/// Mandatory rule solved against the row. A formula that fails to solve
/// makes the column mandatory.
fn mandatory_formula(owner: String, expression: Expression) -> Mandatory {
    Mandatory::when(move |row: &TableRow| {
        let context = FormulaContext::new();
        match FormulaSolver::new(&context).evaluate(row, &owner, &expression, Accessor::Code) {
            Ok(solved) => is_truthy(&solved),
            Err(err) => {
                tracing::warn!(column = %owner, error = %err, "mandatory formula failed");
                true
            }
        }
    })
}

/// Pick source whose list name is solved against the row.
fn list_formula(
    owner: String,
    expression: Expression,
    lists: &Lists,
) -> impl Fn(&TableRow) -> SelectionList + Send + Sync + 'static {
    let lists = Arc::clone(lists);
    move |row: &TableRow| {
        let context = FormulaContext::new();
        match FormulaSolver::new(&context).evaluate(row, &owner, &expression, Accessor::Code) {
            Ok(name) => lists.get(&name).cloned().unwrap_or_else(|| {
                tracing::debug!(column = %owner, list = %name, "no selection list for row");
                SelectionList::new()
            }),
            Err(err) => {
                tracing::warn!(column = %owner, error = %err, "picklist formula failed");
                SelectionList::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::FormulaError;
    use crate::selection::Selection;
    use crate::table::{ColumnId, ColumnValue};

    const CATALOG: &str = r#"{
        "version": 1,
        "lists": {
            "sample_kind": [
                {"code": "B", "description": "Blood"},
                {"code": "U", "description": "Urine"}
            ],
            "species_plant": [{"code": "QR", "description": "Quercus robur"}],
            "species_animal": [{"code": "CL", "description": "Canis lupus"}]
        },
        "tables": [
            {
                "name": "project",
                "version_column": "version",
                "columns": [
                    {"id": "code", "type": "string", "editable": true, "mandatory": true, "natural_key": true},
                    {"id": "version", "type": "string", "default_code": "1.0"}
                ]
            },
            {
                "name": "sample",
                "columns": [
                    {"id": "project_id", "type": "integer", "foreign_key": true},
                    {"id": "kind", "type": "picklist", "editable": true, "picklist": "sample_kind", "default_code": "B"},
                    {"id": "category", "type": "string", "editable": true},
                    {"id": "species", "type": "picklist", "editable": true, "picklist": "species_${category}"},
                    {"id": "volume", "type": "unsigned_integer", "editable": true, "mandatory": "${needs_volume}"},
                    {"id": "needs_volume", "type": "string", "editable": true, "default_code": "no"},
                    {"id": "name", "type": "string", "code_formula": "${project.code}-${id}"}
                ],
                "relations": [{"parent_table": "project", "foreign_key": "project_id"}]
            }
        ]
    }"#;

    fn catalog() -> Catalog {
        Catalog::from_json_str(CATALOG).unwrap()
    }

    fn replace(from: &str, to: &str) -> Result<Catalog, CatalogError> {
        assert!(CATALOG.contains(from), "fixture does not contain {from}");
        Catalog::from_json_str(&CATALOG.replace(from, to))
    }

    #[test]
    fn test_load_catalog() {
        let catalog = catalog();
        let names: Vec<_> = catalog.tables().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["project", "sample"]);

        let project = catalog.schema("project").unwrap();
        assert_eq!(project.version_column_id().unwrap().as_str(), "version");
        assert!(project.get_by_id("code").unwrap().is_natural_key());

        let sample = catalog.schema("sample").unwrap();
        assert_eq!(sample.relation_to("project").unwrap().foreign_key().as_str(), "project_id");
        assert!(catalog.schema("missing").is_none());
        assert_eq!(catalog.selection_list("sample_kind").unwrap().len(), 2);
    }

    #[test]
    fn test_static_picklist_default_takes_description() {
        let sample = catalog().schema("sample").unwrap();
        let mut row = TableRow::new(sample);
        row.initialize().unwrap();
        assert_eq!(
            row.get("kind").unwrap(),
            &ColumnValue::choice(Selection::new("B", "Blood"))
        );
    }

    #[test]
    fn test_picklist_formula_follows_row() {
        let sample = catalog().schema("sample").unwrap();
        let species = sample.get_by_id("species").unwrap();
        let mut row = TableRow::new(sample.clone());
        row.initialize().unwrap();

        assert!(species.list(&row).is_empty());

        row.put_text("category", "plant").unwrap();
        let list = species.list(&row);
        assert_eq!(list.get("QR").unwrap().description(), "Quercus robur");

        row.put_text("category", "animal").unwrap();
        assert!(species.list(&row).contains(&Selection::new("CL", "Canis lupus")));
    }

    #[test]
    fn test_mandatory_formula() {
        let sample = catalog().schema("sample").unwrap();
        let volume = sample.get_by_id("volume").unwrap();
        let mut row = TableRow::new(sample.clone());
        row.initialize().unwrap();
        assert!(!volume.is_mandatory(&row));

        row.put_text("needs_volume", "Yes").unwrap();
        assert!(volume.is_mandatory(&row));
        assert_eq!(row.missing_mandatory(), vec![ColumnId::from("volume")]);
    }

    #[test]
    fn test_unsupported_version() {
        let err = replace(r#""version": 1,"#, r#""version": 7,"#).unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedVersion(7)));
    }

    #[test]
    fn test_unknown_list() {
        let err = replace(r#""picklist": "sample_kind""#, r#""picklist": "nope""#).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownList { ref list, .. } if list == "nope"));
    }

    #[test]
    fn test_unreachable_ancestor() {
        let err = replace("${project.code}", "${site.code}").unwrap_err();
        assert!(matches!(err, CatalogError::UnreachableAncestor { ref ancestor, .. } if ancestor == "site"));
    }

    #[test]
    fn test_unknown_ancestor_column() {
        let err = replace("${project.code}", "${project.title}").unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_unknown_parent_table() {
        let err = replace(r#""parent_table": "project""#, r#""parent_table": "site""#).unwrap_err();
        assert!(matches!(err, CatalogError::Schema(SchemaError::UnknownTable(ref t)) if t == "site"));
    }

    #[test]
    fn test_duplicate_table() {
        let err = replace(r#""name": "sample""#, r#""name": "project""#).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateTable(ref t) if t == "project"));
    }

    #[test]
    fn test_malformed_formula() {
        let err = replace(r#""default_code": "no""#, r#""default_code": "${no""#).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::InvalidFormula {
                header: "default_code",
                source: FormulaError::Malformed { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_parse_error() {
        let err = Catalog::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn test_row_rules_reject_ancestor_references() {
        let err = replace(r#""mandatory": "${needs_volume}""#, r#""mandatory": "${project.code}""#)
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::AncestorInRowRule { header: "mandatory", ref reference, .. }
                if reference == "${project.code}"
        ));

        let err = replace("species_${category}", "species_${project.code}").unwrap_err();
        assert!(matches!(err, CatalogError::AncestorInRowRule { header: "picklist", .. }));
    }

    #[test]
    fn test_row_rules_accept_own_table_qualifier() {
        let catalog = replace(r#""mandatory": "${needs_volume}""#, r#""mandatory": "${sample.needs_volume}""#)
            .unwrap();
        let sample = catalog.schema("sample").unwrap();
        let mut row = TableRow::new(sample.clone());
        row.initialize().unwrap();
        assert!(!sample.get_by_id("volume").unwrap().is_mandatory(&row));
    }

    #[test]
    fn test_invalid_table_name() {
        let err = replace(r#""name": "sample""#, r#""name": "../escaped""#).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Schema(SchemaError::InvalidTableName(ref t)) if t == "../escaped"
        ));
    }
}

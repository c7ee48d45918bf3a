//! Ancestor rows: context assembly and qualified formula references.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use ntest::timeout;

use table_row_core::table::Relation;
use table_row_core::{
    ColumnDefinition, ColumnType, FormulaContext, FormulaError, MemoryStore, MetadataSource,
    RowError, RowId, SchemaError, Selection, SelectionList, TableRow, TableSchema,
};

use super::helpers::{catalog, schema};

/// Saves project ACME and sample 7 below it, returns the stored sample.
fn stored_sample(store: &mut MemoryStore) -> Result<TableRow> {
    let catalog = catalog();

    let mut project = TableRow::new(schema(&catalog, "project"));
    project.initialize()?;
    project.apply_edit("acronym", "ACME")?;
    let project_id = project.save(store)?;

    let mut sample = TableRow::new(schema(&catalog, "sample"));
    sample.initialize()?;
    sample.put_text("project_id", project_id.to_string())?;
    let context = FormulaContext::for_row(&sample, &catalog, &*store)?;
    sample.apply_edit_with("number", "7", &context)?;
    sample.save(store)?;
    Ok(sample)
}

#[timeout(1000)]
#[test]
fn test_context_walks_to_grandparent() -> Result<()> {
    let catalog = catalog();
    let mut store = MemoryStore::new();
    let sample = stored_sample(&mut store)?;

    let mut aliquot = TableRow::new(schema(&catalog, "aliquot"));
    aliquot.initialize()?;
    aliquot.put_text("sample_id", sample.id().unwrap().to_string())?;
    aliquot.put("container", Selection::new("T", "Tube").into())?;

    let context = FormulaContext::for_row(&aliquot, &catalog, &store)?;
    assert_eq!(context.len(), 2);
    assert!(context.ancestor("sample").is_some());
    assert!(context.ancestor("project").is_some());

    aliquot.update_formulas_with(&context)?;
    assert_eq!(aliquot.get("barcode").unwrap().code(), "ACME-2024-7/ACME/T");
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_missing_ancestor_leaves_value_untouched() -> Result<()> {
    let catalog = catalog();
    let store = MemoryStore::new();

    let mut aliquot = TableRow::new(schema(&catalog, "aliquot"));
    aliquot.initialize()?;
    let context = FormulaContext::for_row(&aliquot, &catalog, &store)?;
    assert!(context.is_empty());

    let err = aliquot.update_formulas_with(&context).unwrap_err();
    assert!(matches!(
        err,
        RowError::Formula(FormulaError::MissingAncestor { ref table, .. }) if table == "sample"
    ));
    assert!(aliquot.get("barcode").unwrap().is_empty());
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_unstored_parent_is_skipped() -> Result<()> {
    let catalog = catalog();
    let store = MemoryStore::new();

    let mut sample = TableRow::new(schema(&catalog, "sample"));
    sample.initialize()?;
    sample.put_text("project_id", RowId(99).to_string())?;

    let context = FormulaContext::for_row(&sample, &catalog, &store)?;
    assert!(context.ancestor("project").is_none());
    Ok(())
}

/// Metadata held in a plain map.
#[derive(Default)]
struct MapMetadata {
    schemas: HashMap<String, Arc<TableSchema>>,
}

impl MapMetadata {
    fn with(mut self, schema: &Arc<TableSchema>) -> Self {
        self.schemas
            .insert(schema.name().to_string(), Arc::clone(schema));
        self
    }
}

impl MetadataSource for MapMetadata {
    fn schema(&self, table: &str) -> Option<Arc<TableSchema>> {
        self.schemas.get(table).cloned()
    }

    fn selection_list(&self, _name: &str) -> Option<SelectionList> {
        None
    }
}

fn linked(name: &str, other: &str) -> Result<Arc<TableSchema>> {
    let foreign_key = format!("{other}_id");
    Ok(Arc::new(
        TableSchema::builder(name)
            .column(ColumnDefinition::new(foreign_key.as_str(), ColumnType::Integer).foreign_key())
            .column(ColumnDefinition::new("tag", ColumnType::String).editable())
            .relation(Relation::new(other, foreign_key.as_str()))
            .build()?,
    ))
}

#[timeout(1000)]
#[test]
fn test_relation_loop_visits_each_table_once() -> Result<()> {
    let left = linked("left", "right")?;
    let right = linked("right", "left")?;
    let metadata = MapMetadata::default().with(&left).with(&right);
    let mut store = MemoryStore::new();

    let mut right_row = TableRow::new(right);
    right_row.put_text("left_id", "1")?;
    right_row.put_text("tag", "R")?;
    right_row.save(&mut store)?;

    let mut left_row = TableRow::new(left);
    left_row.put_text("right_id", "1")?;
    left_row.save(&mut store)?;

    let context = FormulaContext::for_row(&left_row, &metadata, &store)?;
    assert_eq!(context.len(), 1);
    assert_eq!(
        context.ancestor("right").unwrap().get("tag").unwrap().code(),
        "R"
    );
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_unknown_parent_schema() -> Result<()> {
    let left = linked("left", "right")?;
    let metadata = MapMetadata::default().with(&left);
    let store = MemoryStore::new();

    let mut row = TableRow::new(left);
    row.put_text("right_id", "1")?;
    let err = FormulaContext::for_row(&row, &metadata, &store).unwrap_err();
    assert!(matches!(
        err,
        RowError::Schema(SchemaError::UnknownTable(ref table)) if table == "right"
    ));
    Ok(())
}

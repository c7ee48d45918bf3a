//! Row lifecycle: create, initialize, edit, recompute, save, version, delete.

use anyhow::Result;
use ntest::timeout;

use table_row_core::table::{EditOutcome, RowStatus};
use table_row_core::{FormulaContext, MemoryStore, RowStore, Selection, TableRow};

use super::helpers::{catalog, schema};

#[timeout(1000)]
#[test]
fn test_full_row_lifecycle() -> Result<()> {
    let catalog = catalog();
    let mut store = MemoryStore::new();

    let project_schema = schema(&catalog, "project");
    let mut project = TableRow::new(project_schema);
    project.initialize()?;
    assert_eq!(project.status(), RowStatus::MandatoryMissing);

    assert_eq!(project.apply_edit("acronym", "ACME")?, EditOutcome::Applied);
    assert_eq!(project.status(), RowStatus::Ok);
    let project_id = project.save(&mut store)?;

    let sample_schema = schema(&catalog, "sample");
    let mut sample = TableRow::new(sample_schema.clone());
    sample.initialize()?;
    sample.put_text("project_id", project_id.to_string())?;
    assert_eq!(sample.status(), RowStatus::MandatoryMissing);

    let context = FormulaContext::for_row(&sample, &catalog, &store)?;
    assert_eq!(context.len(), 1);

    sample.apply_edit_with("number", "7", &context)?;
    assert_eq!(sample.status(), RowStatus::Ok);
    assert_eq!(sample.get("code").unwrap().code(), "ACME-2024-7");
    assert_eq!(sample.get("summary").unwrap().label(), "ACME-2024-7 Blood");

    sample.apply_edit_with("kind", Selection::new("U", "Urine"), &context)?;
    assert_eq!(sample.get("summary").unwrap().label(), "ACME-2024-7 Urine");

    let sample_id = sample.save(&mut store)?;
    assert_eq!(sample.id(), Some(sample_id));

    let children = project.children(&store, &sample_schema)?;
    assert_eq!(children.len(), 1);
    assert!(children[0].same_as(&sample));

    assert_eq!(sample.create_new_version()?.as_deref(), Some("1.1"));
    assert_eq!(sample.save(&mut store)?, sample_id);

    let loaded = store.load(&sample_schema)?;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].version().unwrap().code(), "1.1");
    assert_eq!(loaded[0].get("kind").unwrap().label(), "Urine");

    sample.delete(&mut store)?;
    assert!(project.children(&store, &sample_schema)?.is_empty());
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_loaded_rows_skip_initialization() -> Result<()> {
    let catalog = catalog();
    let mut store = MemoryStore::new();
    let project_schema = schema(&catalog, "project");

    let mut project = TableRow::new(project_schema.clone());
    project.initialize()?;
    project.apply_edit("year", "1999")?;
    project.apply_edit("acronym", "OLD")?;
    let id = project.save(&mut store)?;

    let loaded = store.find(&project_schema, id)?.expect("stored row");
    assert_eq!(loaded.get("year").unwrap().code(), "1999");
    assert_eq!(loaded.get("version").unwrap().code(), "1.0");
    Ok(())
}

#[timeout(1000)]
#[test]
fn test_same_natural_key_is_same_row() -> Result<()> {
    let catalog = catalog();
    let project_schema = schema(&catalog, "project");

    let mut first = TableRow::new(project_schema.clone());
    let mut second = TableRow::new(project_schema);
    first.initialize()?;
    second.initialize()?;
    assert!(!first.same_as(&second));

    first.apply_edit("acronym", "ACME")?;
    second.apply_edit("acronym", "ACME")?;
    second.apply_edit("year", "2030")?;
    assert!(first.same_as(&second));
    Ok(())
}

#[cfg(feature = "parallel")]
#[timeout(5000)]
#[test]
fn test_update_all_parallel() -> Result<()> {
    use std::sync::Arc;
    use table_row_core::formula::update_all_parallel;
    use table_row_core::{ColumnDefinition, ColumnType, TableSchema};

    let schema = Arc::new(
        TableSchema::builder("item")
            .column(ColumnDefinition::new("n", ColumnType::Integer).editable())
            .column(ColumnDefinition::new("label", ColumnType::String).code_formula("item-${n}"))
            .build()?,
    );
    let mut rows = (0..200)
        .map(|n| -> Result<TableRow> {
            let mut row = TableRow::new(schema.clone());
            row.put_text("n", n.to_string())?;
            Ok(row)
        })
        .collect::<Result<Vec<_>>>()?;

    update_all_parallel(&mut rows)?;

    for (n, row) in rows.iter().enumerate() {
        assert_eq!(row.get("label").unwrap().code(), format!("item-{n}"));
    }
    Ok(())
}

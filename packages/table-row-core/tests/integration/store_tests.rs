//! JSON file store driven through a catalog loaded from disk.

use std::fs;

use anyhow::Result;
use ntest::timeout;
use tempfile::tempdir;

use table_row_core::{
    Catalog, FormulaContext, JsonFileStore, MetadataSource, RowId, RowStore, StoreConfig, TableRow,
};

use super::helpers::CATALOG;

#[timeout(5000)]
#[test]
fn test_rows_survive_reopen() -> Result<()> {
    let temp_dir = tempdir()?;
    let catalog_path = temp_dir.path().join("catalog.json");
    fs::write(&catalog_path, CATALOG)?;
    let catalog = Catalog::from_path(&catalog_path)?;

    let config = StoreConfig {
        data_dir: temp_dir.path().join("data"),
        retry_delay_ms: 0,
        ..Default::default()
    };
    let project_schema = catalog.schema("project").unwrap();
    let sample_schema = catalog.schema("sample").unwrap();

    {
        let mut store = JsonFileStore::open(config.clone())?;

        let mut project = TableRow::new(project_schema.clone());
        project.initialize()?;
        project.apply_edit("acronym", "ACME")?;
        let project_id = project.save(&mut store)?;

        for number in ["1", "2"] {
            let mut sample = TableRow::new(sample_schema.clone());
            sample.initialize()?;
            sample.put_text("project_id", project_id.to_string())?;
            let context = FormulaContext::for_row(&sample, &catalog, &store)?;
            sample.apply_edit_with("number", number, &context)?;
            sample.save(&mut store)?;
        }
    }

    let mut store = JsonFileStore::open(config)?;
    assert!(store.table_path("sample").exists());

    let project = store.find(&project_schema, RowId(1))?.expect("project stored");
    let samples = project.children(&store, &sample_schema)?;
    let codes: Vec<_> = samples
        .iter()
        .map(|row| row.get("code").unwrap().code().to_string())
        .collect();
    assert_eq!(codes, vec!["ACME-2024-1", "ACME-2024-2"]);

    let mut first = samples.into_iter().next().unwrap();
    first.create_new_version()?;
    first.save(&mut store)?;

    let reopened = JsonFileStore::open(store.config().clone())?;
    let stored = reopened.find(&sample_schema, RowId(1))?.unwrap();
    assert_eq!(stored.version().unwrap().code(), "1.1");
    Ok(())
}

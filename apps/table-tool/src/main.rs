//! CLI tool for catalog validation and row inspection.
//!
//! Provides commands for:
//! - Catalog validation
//! - Row creation with defaults, edits and formulas
//! - Listing stored rows and bumping row versions

mod cli;

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing_subscriber::prelude::*;

use cli::{Cli, Commands, StoreArgs};
use table_row_core::table::CellInput;
use table_row_core::{
    Catalog, FormulaContext, JsonFileStore, MemoryStore, MetadataSource, RowId, RowStore,
    TableRow, TableSchema,
};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "table_tool=info,table_row_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { catalog } => {
            let catalog = load_catalog(&catalog)?;
            validate(&catalog);
        }
        Commands::NewRow {
            catalog,
            table,
            set,
            save,
            store,
        } => {
            let catalog = load_catalog(&catalog)?;
            let schema = table_schema(&catalog, &table)?;
            let mut store = open_store(&store)?;
            new_row(&catalog, schema, &set, save, store.as_mut())?;
        }
        Commands::List {
            catalog,
            table,
            store,
        } => {
            let catalog = load_catalog(&catalog)?;
            let schema = table_schema(&catalog, &table)?;
            let store = open_file_store(&store)?;
            list(&store, &schema)?;
        }
        Commands::BumpVersion {
            catalog,
            table,
            id,
            store,
        } => {
            let catalog = load_catalog(&catalog)?;
            let schema = table_schema(&catalog, &table)?;
            let mut store = open_file_store(&store)?;
            bump_version(&mut store, &schema, RowId(id))?;
        }
    }

    Ok(())
}

fn load_catalog(path: &std::path::Path) -> Result<Catalog> {
    Catalog::from_path(path).with_context(|| format!("Failed to load catalog {}", path.display()))
}

fn table_schema(catalog: &Catalog, table: &str) -> Result<Arc<TableSchema>> {
    catalog
        .schema(table)
        .ok_or_else(|| anyhow!("Table '{}' is not in the catalog", table))
}

fn open_file_store(args: &StoreArgs) -> Result<JsonFileStore> {
    let config = args
        .config()
        .ok_or_else(|| anyhow!("--data-dir is required"))?;
    JsonFileStore::open(config).context("Failed to open row store")
}

/// File store when a data directory is given, an empty memory store otherwise.
fn open_store(args: &StoreArgs) -> Result<Box<dyn RowStore>> {
    Ok(match args.config() {
        Some(config) => Box::new(JsonFileStore::open(config).context("Failed to open row store")?),
        None => Box::new(MemoryStore::new()),
    })
}

fn validate(catalog: &Catalog) {
    for schema in catalog.tables() {
        println!("Table: {}", schema.name());
        println!("  id column: {}", schema.id_column_id());
        if let Some(version) = schema.version_column_id() {
            println!("  version column: {}", version);
        }
        for relation in schema.relations() {
            println!(
                "  parent: {} via {}",
                relation.parent_table(),
                relation.foreign_key()
            );
        }
        for column in schema.columns() {
            let mut flags = Vec::new();
            if column.is_editable() {
                flags.push("editable");
            }
            if column.is_natural_key() {
                flags.push("natural key");
            }
            if column.is_foreign_key() {
                flags.push("foreign key");
            }
            println!(
                "  - {} ({}) {}",
                column.id(),
                column.column_type(),
                flags.join(", ")
            );
        }
    }
    for (name, list) in catalog.lists() {
        println!("List: {} ({} entries)", name, list.len());
    }
    tracing::info!("catalog is valid");
}

fn parse_assignment(assignment: &str) -> Result<(&str, &str)> {
    assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid assignment '{}', expected column=value", assignment))
}

fn new_row(
    catalog: &Catalog,
    schema: Arc<TableSchema>,
    assignments: &[String],
    save: bool,
    store: &mut dyn RowStore,
) -> Result<()> {
    let mut row = TableRow::new(schema.clone());
    let mut edits = Vec::new();

    // Foreign keys first: they decide which ancestors formulas can read.
    for assignment in assignments {
        let (column, value) = parse_assignment(assignment)?;
        let definition = schema.get_by_id(column)?;
        if definition.is_foreign_key() {
            row.put_text(column, value)?;
        } else {
            edits.push((column, value));
        }
    }

    let context = FormulaContext::for_row(&row, catalog, &*store)?;
    row.initialize_with(&context)?;

    for (column, value) in edits {
        let definition = schema.get_by_id(column)?;
        let input = if definition.is_picklist() {
            let selection = definition
                .choices(&row)
                .get(value)
                .cloned()
                .ok_or_else(|| anyhow!("'{}' is not a choice of column '{}'", value, column))?;
            CellInput::Choice(selection)
        } else {
            CellInput::from(value)
        };
        row.apply_edit_with(column, input, &context)?;
    }
    row.update_formulas_with(&context)?;

    print!("{}", row);
    println!("Status: {}", row.status());
    for column in row.missing_mandatory() {
        println!("Missing: {}", column);
    }

    if save {
        let id = row.save(store)?;
        tracing::info!(table = schema.name(), id = id.0, "row saved");
        println!("Saved with id {}", id);
    }
    Ok(())
}

fn list(store: &JsonFileStore, schema: &Arc<TableSchema>) -> Result<()> {
    let rows = store.load(schema)?;
    if rows.is_empty() {
        println!("No rows in '{}'", schema.name());
    }
    for row in rows {
        println!("Row {} ({})", row.raw_id(), row.status());
        print!("{}", row);
    }
    Ok(())
}

fn bump_version(store: &mut JsonFileStore, schema: &Arc<TableSchema>, id: RowId) -> Result<()> {
    let mut row = store
        .find(schema, id)?
        .ok_or_else(|| anyhow!("No row {} in '{}'", id, schema.name()))?;
    let Some(version) = row.create_new_version()? else {
        bail!("Table '{}' keeps no version", schema.name());
    };
    row.save(store)?;
    println!("Row {} is now at version {}", id, version);
    Ok(())
}

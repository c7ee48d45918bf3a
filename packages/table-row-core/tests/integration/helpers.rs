//! Shared fixtures: a three-level catalog (project, sample, aliquot).

use std::sync::Arc;

use table_row_core::{Catalog, MetadataSource, TableSchema};

pub const CATALOG: &str = r#"{
    "version": 1,
    "lists": {
        "sample_kind": [
            {"code": "B", "description": "Blood"},
            {"code": "U", "description": "Urine"}
        ],
        "container": [
            {"code": "T", "description": "Tube"},
            {"code": "P", "description": "Plate"}
        ]
    },
    "tables": [
        {
            "name": "project",
            "version_column": "version",
            "columns": [
                {"id": "acronym", "type": "string", "editable": true, "mandatory": true, "natural_key": true},
                {"id": "year", "type": "integer", "editable": true, "default_code": "2024"},
                {"id": "version", "type": "string", "default_code": "1.0"}
            ]
        },
        {
            "name": "sample",
            "version_column": "version",
            "columns": [
                {"id": "project_id", "type": "integer", "foreign_key": true},
                {"id": "number", "type": "unsigned_integer", "editable": true, "mandatory": true, "natural_key": true},
                {"id": "kind", "type": "picklist", "editable": true, "picklist": "sample_kind", "default_code": "B"},
                {"id": "code", "type": "string", "natural_key": true,
                 "code_formula": "${project.acronym}-${project.year}-${number}"},
                {"id": "summary", "type": "string",
                 "label_formula": "${code} ${kind:label}"},
                {"id": "version", "type": "string", "default_code": "1.0"}
            ],
            "relations": [{"parent_table": "project", "foreign_key": "project_id"}]
        },
        {
            "name": "aliquot",
            "columns": [
                {"id": "sample_id", "type": "integer", "foreign_key": true},
                {"id": "container", "type": "picklist", "editable": true, "picklist": "container", "mandatory": true},
                {"id": "barcode", "type": "string",
                 "code_formula": "${sample.code}/${project.acronym}/${container}"}
            ],
            "relations": [{"parent_table": "sample", "foreign_key": "sample_id"}]
        }
    ]
}"#;

pub fn catalog() -> Catalog {
    Catalog::from_json_str(CATALOG).expect("fixture catalog loads")
}

pub fn schema(catalog: &Catalog, table: &str) -> Arc<TableSchema> {
    catalog.schema(table).expect("fixture table exists")
}

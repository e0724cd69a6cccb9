#![allow(dead_code)]

use std::path::PathBuf;

use pgprompt::db::{ColumnInfo, SchemaModel, TableInfo};

pub(crate) fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from("tests/fixtures").join(name)
}

pub(crate) fn load_fixture_schema(name: &str) -> SchemaModel {
    let json = std::fs::read_to_string(fixture_path(name)).expect("fixture should be readable");
    SchemaModel::from_json(&json).expect("fixture should parse")
}

pub(crate) fn schema(tables: Vec<TableInfo>) -> SchemaModel {
    SchemaModel {
        service_name: "test".into(),
        tables,
        ..Default::default()
    }
}

pub(crate) fn spatial_schema(tables: Vec<TableInfo>) -> SchemaModel {
    SchemaModel {
        has_spatial_extension: true,
        ..schema(tables)
    }
}

pub(crate) fn table(name: &str, columns: &[&str]) -> TableInfo {
    TableInfo::new("public", name).with_columns(
        columns
            .iter()
            .map(|c| ColumnInfo::new(*c, "text"))
            .collect(),
    )
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Harvested description of one database service.
///
/// Never contains row data. The engine treats a loaded model as
/// immutable and replaces it wholesale after a reharvest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub service_name: String,
    #[serde(default)]
    pub tables: Vec<TableInfo>,
    #[serde(default)]
    pub views: Vec<ViewInfo>,
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
    #[serde(default)]
    pub has_spatial_extension: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harvested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema_name: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub schema_name: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fk_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fk_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub is_geometry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srid: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub schema_name: String,
    pub name: String,
    pub return_type: String,
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Broad shape of a geometry column, used to pick spatial templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryShape {
    Point,
    Linear,
    Polygonal,
    Other,
}

impl SchemaModel {
    /// Tables carrying at least one geometry column, in schema order.
    pub fn geometry_tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.iter().filter(|t| t.geometry_column().is_some())
    }

    /// Parses a model previously written with `serde_json`.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl TableInfo {
    pub fn new(schema_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnInfo>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// `schema.table`, unquoted.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.name)
    }

    pub fn geometry_column(&self) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.is_geometry)
    }
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            ..Default::default()
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.is_foreign_key = true;
        self.fk_table = Some(table.into());
        self.fk_column = Some(column.into());
        self
    }

    pub fn geometry(mut self, geometry_type: impl Into<String>, srid: i32) -> Self {
        self.is_geometry = true;
        self.geometry_type = Some(geometry_type.into());
        self.srid = Some(srid);
        self
    }

    pub fn shape(&self) -> Option<GeometryShape> {
        if !self.is_geometry {
            return None;
        }
        let shape = match self
            .geometry_type
            .as_deref()
            .map(str::to_ascii_uppercase)
            .as_deref()
        {
            Some("POINT") | Some("MULTIPOINT") => GeometryShape::Point,
            Some("LINESTRING") | Some("MULTILINESTRING") => GeometryShape::Linear,
            Some("POLYGON") | Some("MULTIPOLYGON") => GeometryShape::Polygonal,
            _ => GeometryShape::Other,
        };
        Some(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_is_case_insensitive() {
        let col = ColumnInfo::new("geom", "geometry").geometry("MultiPolygon", 4326);
        assert_eq!(col.shape(), Some(GeometryShape::Polygonal));
        assert_eq!(ColumnInfo::new("id", "integer").shape(), None);
    }

    #[test]
    fn deserializes_sparse_json() {
        let model = SchemaModel::from_json(
            r#"{"service_name":"gis","tables":[{"schema_name":"public","name":"roads",
                "columns":[{"name":"geom","data_type":"geometry","is_geometry":true,
                "geometry_type":"LINESTRING"}]}],"has_spatial_extension":true}"#,
        )
        .unwrap();
        assert_eq!(model.tables[0].qualified_name(), "public.roads");
        assert_eq!(model.geometry_tables().count(), 1);
        assert!(model.views.is_empty());
    }
}

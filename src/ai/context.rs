use crate::db::{ColumnInfo, SchemaModel};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

const CONTEXT_HEADER: &str = "Previous conversation:\n";

/// One prior question and what came of it. Never mutated by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_query: String,
    pub generated_sql: Option<String>,
    pub row_count: Option<usize>,
}

impl ConversationTurn {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            ..Default::default()
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>, row_count: usize) -> Self {
        self.generated_sql = Some(sql.into());
        self.row_count = Some(row_count);
        self
    }
}

/// Renders the last `window` turns as predictor context. Empty when there
/// are no turns.
pub fn render_conversation_context(turns: &[ConversationTurn], window: usize) -> String {
    if turns.is_empty() || window == 0 {
        return String::new();
    }
    let start = turns.len().saturating_sub(window);

    let mut out = String::from(CONTEXT_HEADER);
    for turn in &turns[start..] {
        let _ = writeln!(out, "User: {}", turn.user_query);
        if let Some(sql) = turn.generated_sql.as_deref().filter(|s| !s.is_empty()) {
            let _ = writeln!(out, "SQL: {}", sql);
        }
        if let Some(n) = turn.row_count.filter(|n| *n > 0) {
            let _ = writeln!(out, "(Returned {} rows)", n);
        }
        out.push('\n');
    }
    out
}

fn column_tags(col: &ColumnInfo) -> String {
    let mut tags = String::new();
    if col.is_primary_key {
        tags.push_str(" [PK]");
    }
    if col.is_foreign_key {
        let _ = write!(
            tags,
            " [FK -> {}.{}]",
            col.fk_table.as_deref().unwrap_or_default(),
            col.fk_column.as_deref().unwrap_or_default()
        );
    }
    if col.is_geometry {
        let geom_type = col.geometry_type.as_deref().unwrap_or("GEOMETRY");
        match col.srid {
            Some(srid) => {
                let _ = write!(tags, " [GEOMETRY: {}, SRID: {}]", geom_type, srid);
            }
            None => {
                let _ = write!(tags, " [GEOMETRY: {}]", geom_type);
            }
        }
    }
    tags
}

impl SchemaModel {
    /// Plain-text outline of the schema. Never contains row data.
    pub fn describe(&self) -> String {
        let mut out = String::from("DATABASE SCHEMA:\n================\n\n");

        if self.has_spatial_extension {
            out.push_str("PostGIS is installed - spatial queries are supported.\n\n");
        }

        out.push_str("TABLES:\n");
        for table in &self.tables {
            let _ = write!(out, "- {}", table.qualified_name());
            if let Some(comment) = table.comment.as_deref().filter(|c| !c.is_empty()) {
                let _ = write!(out, " ({})", comment);
            }
            out.push('\n');
            for col in &table.columns {
                let _ = write!(out, "    - {} ({}){}", col.name, col.data_type, column_tags(col));
                if let Some(comment) = col.comment.as_deref().filter(|c| !c.is_empty()) {
                    let _ = write!(out, " - {}", comment);
                }
                out.push('\n');
            }
            out.push('\n');
        }

        if !self.views.is_empty() {
            out.push_str("VIEWS:\n");
            for view in &self.views {
                let _ = write!(out, "- {}.{}", view.schema_name, view.name);
                if let Some(comment) = view.comment.as_deref().filter(|c| !c.is_empty()) {
                    let _ = write!(out, " ({})", comment);
                }
                out.push('\n');
            }
            out.push('\n');
        }

        out
    }

    /// Compact `CREATE TABLE` rendering for prompt building.
    pub fn to_ddl_summary(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let name = table.qualified_name();
            let _ = writeln!(out, "-- {}", name);
            let _ = writeln!(out, "CREATE TABLE {} (", name);
            for (i, col) in table.columns.iter().enumerate() {
                let mut parts = vec![format!("  {} {}", col.name, col.data_type)];
                if col.is_primary_key {
                    parts.push("PRIMARY KEY".into());
                } else if !col.is_nullable {
                    parts.push("NOT NULL".into());
                }
                if let (true, Some(t), Some(c)) = (col.is_foreign_key, &col.fk_table, &col.fk_column) {
                    parts.push(format!("REFERENCES {}({})", t, c));
                }
                let suffix = if i + 1 < table.columns.len() { "," } else { "" };
                let _ = writeln!(out, "{}{}", parts.join(" "), suffix);
            }
            out.push_str(");\n\n");
        }
        out
    }
}

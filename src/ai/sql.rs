//! SQL fragment assembly.
//!
//! Identifiers come from the harvested schema, never from question text.
//! Numbers taken from the question go through [`limit_literal`] or
//! [`distance_literal`] first.

use crate::db::{ColumnInfo, TableInfo};
use regex::Regex;
use std::sync::LazyLock;

static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());
static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?$").unwrap());

pub const METERS_PER_KILOMETER: &str = "1000";
pub const METERS_PER_MILE: &str = "1609.34";

const USER_SCHEMA_FILTER: &str =
    "table_type = 'BASE TABLE' AND table_schema NOT IN ('pg_catalog', 'information_schema')";

/// Distance unit recognised in a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Miles,
}

pub fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `"schema"."table"`
pub fn qualified(table: &TableInfo) -> String {
    format!("{}.{}", quote_ident(&table.schema_name), quote_ident(&table.name))
}

/// `'schema.table'`, used to tag rows with their source table.
fn source_tag(table: &TableInfo) -> String {
    quote_literal(&table.qualified_name())
}

pub fn limit_literal(raw: &str) -> Option<&str> {
    DIGITS_RE.is_match(raw).then_some(raw)
}

/// Renders `raw` as a meters expression, or `None` if it is not a plain number.
pub fn distance_literal(raw: &str, unit: DistanceUnit) -> Option<String> {
    if !DECIMAL_RE.is_match(raw) {
        return None;
    }
    Some(match unit {
        DistanceUnit::Meters => raw.to_string(),
        DistanceUnit::Kilometers => format!("{} * {}", raw, METERS_PER_KILOMETER),
        DistanceUnit::Miles => format!("{} * {}", raw, METERS_PER_MILE),
    })
}

pub fn select_all(table: &TableInfo, limit: &str) -> String {
    format!("SELECT * FROM {} LIMIT {}", qualified(table), limit)
}

pub fn count_rows(table: &TableInfo) -> String {
    format!("SELECT COUNT(*) AS count FROM {}", qualified(table))
}

/// One `COUNT(*)` per table joined with `UNION ALL`, largest first.
pub fn row_counts<'a>(
    tables: impl IntoIterator<Item = &'a TableInfo>,
    limit: Option<usize>,
) -> Option<String> {
    let parts: Vec<String> = tables
        .into_iter()
        .map(|t| {
            format!(
                "SELECT {} AS table_name, COUNT(*) AS row_count FROM {}",
                source_tag(t),
                qualified(t)
            )
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    let mut sql = parts.join(" UNION ALL ") + " ORDER BY row_count DESC";
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    Some(sql)
}

pub fn describe_columns(table: &TableInfo) -> String {
    format!(
        "SELECT column_name, data_type, is_nullable, column_default \
         FROM information_schema.columns \
         WHERE table_schema = {} AND table_name = {} \
         ORDER BY ordinal_position",
        quote_literal(&table.schema_name),
        quote_literal(&table.name)
    )
}

pub fn list_tables() -> String {
    format!(
        "SELECT table_schema, table_name, \
         (SELECT COUNT(*) FROM information_schema.columns c \
         WHERE c.table_schema = t.table_schema AND c.table_name = t.table_name) AS column_count \
         FROM information_schema.tables t \
         WHERE {} \
         ORDER BY table_schema, table_name",
        USER_SCHEMA_FILTER
    )
}

pub fn list_tables_with_columns() -> String {
    format!(
        "SELECT table_schema, table_name, \
         (SELECT string_agg(column_name, ', ') FROM information_schema.columns c \
         WHERE c.table_schema = t.table_schema AND c.table_name = t.table_name) AS columns \
         FROM information_schema.tables t \
         WHERE {} \
         ORDER BY table_schema, table_name",
        USER_SCHEMA_FILTER
    )
}

pub fn within_distance(table: &TableInfo, geom: &ColumnInfo, meters: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE ST_DWithin({}::geography, ST_MakePoint(0, 0)::geography, {}) LIMIT 50",
        qualified(table),
        quote_ident(&geom.name),
        meters
    )
}

pub fn ranked_by_area(table: &TableInfo, geom: &ColumnInfo) -> String {
    let col = quote_ident(&geom.name);
    format!(
        "SELECT *, ST_Area({col}::geography) AS area_sqm FROM {} ORDER BY ST_Area({col}::geography) DESC LIMIT 50",
        qualified(table)
    )
}

pub fn total_length(table: &TableInfo, geom: &ColumnInfo) -> String {
    format!(
        "SELECT SUM(ST_Length({}::geography)) AS total_length_meters FROM {}",
        quote_ident(&geom.name),
        qualified(table)
    )
}

pub fn ranked_by_length(table: &TableInfo, geom: &ColumnInfo) -> String {
    let col = quote_ident(&geom.name);
    format!(
        "SELECT *, ST_Length({col}::geography) AS length_meters FROM {} ORDER BY ST_Length({col}::geography) DESC LIMIT 50",
        qualified(table)
    )
}

/// Rows of several tables over their shared columns, tagged with the source.
pub fn union_common_columns(tables: &[&TableInfo], columns: &[String], total_limit: usize) -> String {
    let col_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let parts: Vec<String> = tables
        .iter()
        .map(|t| {
            format!(
                "SELECT {} AS _source_table, {} FROM {}",
                source_tag(t),
                col_list,
                qualified(t)
            )
        })
        .collect();
    format!("{} LIMIT {}", parts.join(" UNION ALL "), total_limit)
}

/// Sample rows from each table, tagged with the source.
pub fn union_samples(tables: &[&TableInfo], per_table: usize) -> String {
    tables
        .iter()
        .map(|t| {
            format!(
                "(SELECT {} AS _source_table, * FROM {} LIMIT {})",
                source_tag(t),
                qualified(t),
                per_table
            )
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
}

/// One summary row per table: match percentage, what matched, row count.
pub fn match_summary<'a>(rows: impl IntoIterator<Item = (&'a TableInfo, f64, &'a str)>) -> Option<String> {
    let parts: Vec<String> = rows
        .into_iter()
        .map(|(t, score, matched_on)| {
            format!(
                "SELECT {} AS table_name, '{:.0}%' AS match_score, {} AS matched_on, COUNT(*) AS row_count FROM {}",
                source_tag(t),
                score * 100.0,
                quote_literal(matched_on),
                qualified(t)
            )
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join(" UNION ALL ") + " ORDER BY row_count DESC")
}

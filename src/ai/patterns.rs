//! Ordered cascade of question matchers.
//!
//! Each matcher sees the trimmed, lowercased question and either returns
//! complete SQL or declines. The first one to answer wins.

use super::resolver::find_table;
use super::search;
use super::sql::{self, DistanceUnit};
use crate::db::{GeometryShape, SchemaModel, TableInfo};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

static COUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"how many (?:rows|records|entries) (?:are )?in (?:the )?(?:table )?(\w+)",
        r"count (?:of |all )?(?:rows |records )?(?:in )?(?:the )?(\w+)",
        r"(\w+) (?:row |record )?count",
        r"how many (\w+)",
    ])
});

static SHOW_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"show (?:me )?(?:the )?(?:first )?(\d+)? ?(?:rows |records )?(?:from |of )?(?:the )?(\w+)",
        r"list (?:the )?(?:first )?(\d+)? ?(\w+)",
        r"get (?:the )?(?:first )?(\d+)? ?(\w+)",
        r"display (?:the )?(?:first )?(\d+)? ?(\w+)",
    ])
});

static COLUMN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"what (?:are )?(?:the )?columns (?:in |of )?(?:the )?(\w+)",
        r"describe (?:the )?(\w+)",
        r"schema (?:of |for )?(?:the )?(\w+)",
        r"(\w+) structure",
    ])
});

static DISTANCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"within (\d+(?:\.\d+)?)\s*(?:km|kilometers?|m|meters?|mi|miles?)",
        r"(\d+(?:\.\d+)?)\s*(?:km|kilometers?|m|meters?|mi|miles?) (?:from|of|away)",
    ])
});

// Units are whole tokens; a digit may sit directly before them ("1km")
static KILOMETER_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^a-z])(?:km|kilomet(?:er|re)s?)\b").unwrap());
static MILE_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^a-z])(?:mi|miles?)\b").unwrap());

static SELECT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"select (?:all )?(?:from )?(\w+)",
        r"fetch (?:all )?(?:from )?(\w+)",
        r"retrieve (?:all )?(?:from )?(\w+)",
    ])
});

/// Everything a matcher may read. Borrowed from one schema snapshot.
pub struct MatchContext<'a> {
    pub schema: &'a SchemaModel,
    /// Digits only
    pub row_limit: String,
    pub spatial_enabled: bool,
}

type Matcher = fn(&MatchContext<'_>, &str) -> Option<String>;

/// Matchers in priority order.
const MATCHERS: &[(&str, Matcher)] = &[
    ("count", match_count),
    ("show", match_show),
    ("table_info", match_table_info),
    ("spatial", match_spatial),
    ("select", match_select),
    ("keyword_search", match_keyword_search),
    ("table_name", match_table_name),
];

/// Runs the cascade on an already normalized question.
pub fn dispatch(cx: &MatchContext<'_>, query: &str) -> Option<String> {
    MATCHERS.iter().find_map(|(name, matcher)| {
        let sql = matcher(cx, query)?;
        debug!(matcher = name, "Matched query pattern");
        Some(sql)
    })
}

/// First regex (in order) whose group 1 names a known table.
fn first_table<'a>(
    schema: &'a SchemaModel,
    patterns: &[Regex],
    query: &str,
) -> Option<&'a TableInfo> {
    patterns.iter().find_map(|re| {
        let name = re.captures(query)?.get(1)?.as_str();
        find_table(schema, name)
    })
}

fn match_count(cx: &MatchContext<'_>, query: &str) -> Option<String> {
    if query.contains("each table") || query.contains("all tables") {
        if let Some(sql) = sql::row_counts(&cx.schema.tables, None) {
            return Some(sql);
        }
    }
    first_table(cx.schema, &COUNT_PATTERNS, query).map(sql::count_rows)
}

fn match_show(cx: &MatchContext<'_>, query: &str) -> Option<String> {
    SHOW_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(query)?;
        let mut limit: Option<&str> = None;
        let mut table_name: Option<&str> = None;

        // First numeric capture is the limit, first other capture the table
        for m in caps.iter().skip(1).flatten() {
            let text = m.as_str();
            if text.is_empty() {
                continue;
            }
            match sql::limit_literal(text) {
                Some(digits) => {
                    limit.get_or_insert(digits);
                }
                None => {
                    table_name.get_or_insert(text);
                }
            }
        }

        let table = find_table(cx.schema, table_name?)?;
        Some(sql::select_all(table, limit.unwrap_or(cx.row_limit.as_str())))
    })
}

fn match_table_info(cx: &MatchContext<'_>, query: &str) -> Option<String> {
    if query.contains("largest") && query.contains("table") {
        if let Some(sql) = sql::row_counts(&cx.schema.tables, Some(10)) {
            return Some(sql);
        }
    }

    if query.contains("tables")
        && (query.contains("list") || query.contains("show") || query.contains("what"))
    {
        return Some(sql::list_tables());
    }

    first_table(cx.schema, &COLUMN_PATTERNS, query).map(sql::describe_columns)
}

/// Unit named anywhere in the question; kilometers win over miles.
fn distance_unit(query: &str) -> DistanceUnit {
    if KILOMETER_UNIT.is_match(query) {
        DistanceUnit::Kilometers
    } else if MILE_UNIT.is_match(query) {
        DistanceUnit::Miles
    } else {
        DistanceUnit::Meters
    }
}

fn match_spatial(cx: &MatchContext<'_>, query: &str) -> Option<String> {
    if !cx.spatial_enabled || !cx.schema.has_spatial_extension {
        return None;
    }
    let geom_tables: Vec<&TableInfo> = cx.schema.geometry_tables().collect();
    let first = *geom_tables.first()?;

    for re in DISTANCE_PATTERNS.iter() {
        let Some(dist) = re.captures(query).and_then(|c| c.get(1)) else {
            continue;
        };
        let Some(geom) = first.geometry_column() else {
            continue;
        };
        if let Some(meters) = sql::distance_literal(dist.as_str(), distance_unit(query)) {
            return Some(sql::within_distance(first, geom, &meters));
        }
    }

    let first_with_shape = |shape: GeometryShape| {
        geom_tables.iter().find_map(|t| {
            t.columns
                .iter()
                .find(|c| c.shape() == Some(shape))
                .map(|c| (*t, c))
        })
    };

    if query.contains("area") || query.contains("size") {
        if let Some((table, geom)) = first_with_shape(GeometryShape::Polygonal) {
            return Some(sql::ranked_by_area(table, geom));
        }
    }

    if query.contains("length") || query.contains("meters of road") || query.contains("distance") {
        if let Some((table, geom)) = first_with_shape(GeometryShape::Linear) {
            if query.contains("total") || query.contains("sum") {
                return Some(sql::total_length(table, geom));
            }
            return Some(sql::ranked_by_length(table, geom));
        }
    }

    None
}

fn match_select(cx: &MatchContext<'_>, query: &str) -> Option<String> {
    first_table(cx.schema, &SELECT_PATTERNS, query)
        .map(|table| sql::select_all(table, &cx.row_limit))
}

fn match_keyword_search(cx: &MatchContext<'_>, query: &str) -> Option<String> {
    search::match_search(cx.schema, query, &cx.row_limit)
}

fn match_table_name(cx: &MatchContext<'_>, query: &str) -> Option<String> {
    cx.schema
        .tables
        .iter()
        .find(|t| query.contains(&t.name.to_lowercase()))
        .map(|table| sql::select_all(table, &cx.row_limit))
}

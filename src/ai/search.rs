//! Keyword search: the last structural fallback before literal name matching.

use super::resolver::{find_semantic_matches, MatchCandidate};
use super::sql;
use crate::db::{SchemaModel, TableInfo};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

/// Matches within this distance of the best score are combined.
pub const SIMILAR_SCORE_WINDOW: f64 = 0.25;
pub const MAX_SIMILAR_TABLES: usize = 5;
/// A lone top match above this score is queried directly.
pub const OUTLIER_MIN_SCORE: f64 = 0.6;
pub const UNION_ROW_CAP: usize = 100;
const MIN_ROWS_PER_TABLE: usize = 10;
const MAX_SUMMARY_TABLES: usize = 10;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "any", "some", "data", "table", "tables", "related", "information", "do",
    "i", "have", "is", "there", "are", "find", "search", "for", "look", "what", "which",
    "contain", "about", "include", "with", "my", "in", "to",
];

static SEARCH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:do i have|is there|are there|find|search for|look for|any) (?:any )?(.+?)(?:\s+(?:related\s+)?data|\s+tables?|\s+information)?$",
        r"(?:what|which) (?:tables?|data) (?:contain|have|include|relate to|about) (.+)",
        r"(.+?)(?:\s+related)?\s+(?:tables?|data)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn clean(word: &str) -> String {
    word.trim_matches(|c| matches!(c, '.' | ',' | '?' | '!'))
        .to_lowercase()
}

/// Pulls search keywords out of a normalized question.
pub fn extract_keywords(query: &str) -> Vec<String> {
    for re in SEARCH_PATTERNS.iter() {
        if let Some(clause) = re.captures(query).and_then(|c| c.get(1)) {
            let keywords: Vec<String> = clause
                .as_str()
                .split_whitespace()
                .map(clean)
                .filter(|w| w.chars().count() > 2 && !is_stop_word(w))
                .collect();
            if !keywords.is_empty() {
                return keywords;
            }
            break;
        }
    }

    query
        .split_whitespace()
        .map(clean)
        .filter(|w| w.chars().count() > 3 && !is_stop_word(w))
        .collect()
}

/// Column names present in every table, sorted.
pub fn common_columns(tables: &[&TableInfo]) -> Vec<String> {
    let Some((first, rest)) = tables.split_first() else {
        return Vec::new();
    };
    let mut common: BTreeSet<&str> = first.columns.iter().map(|c| c.name.as_str()).collect();
    for table in rest {
        let names: BTreeSet<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        common.retain(|name| names.contains(name));
    }
    common.into_iter().map(str::to_string).collect()
}

/// Builds SQL from keywords found in the question, or `None` if it has none.
/// `row_limit` must be digits only.
pub fn match_search(schema: &SchemaModel, query: &str, row_limit: &str) -> Option<String> {
    let keywords = extract_keywords(query);
    if keywords.is_empty() {
        return None;
    }

    let matches = find_semantic_matches(schema, &keywords);
    Some(resolve_matches(&matches, row_limit))
}

fn resolve_matches(matches: &[MatchCandidate<'_>], row_limit: &str) -> String {
    let Some(top) = matches.first() else {
        return sql::list_tables_with_columns();
    };
    if matches.len() == 1 {
        return sql::select_all(top.table, row_limit);
    }

    let similar: Vec<&TableInfo> = matches
        .iter()
        .filter(|m| top.score - m.score <= SIMILAR_SCORE_WINDOW)
        .take(MAX_SIMILAR_TABLES)
        .map(|m| m.table)
        .collect();

    if similar.len() > 1 {
        let columns = common_columns(&similar);
        debug!(
            tables = similar.len(),
            common_columns = columns.len(),
            "Combining similar matches"
        );
        if !columns.is_empty() {
            return sql::union_common_columns(&similar, &columns, UNION_ROW_CAP);
        }
        let per_table = (UNION_ROW_CAP / similar.len()).max(MIN_ROWS_PER_TABLE);
        return sql::union_samples(&similar, per_table);
    }

    if top.score > OUTLIER_MIN_SCORE {
        return sql::select_all(top.table, row_limit);
    }

    sql::match_summary(
        matches
            .iter()
            .take(MAX_SUMMARY_TABLES)
            .map(|m| (m.table, m.score, m.matched_on.as_str())),
    )
    .unwrap_or_else(sql::list_tables_with_columns)
}

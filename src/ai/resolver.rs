//! Resolves words from a question to tables of the loaded schema.

use super::similarity::{self, MatchKind};
use crate::db::{SchemaModel, TableInfo};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Candidates below this score are discarded.
pub const MIN_MATCH_SCORE: f64 = 0.35;
/// Weight applied to a column-name match when scoring its table.
pub const COLUMN_WEIGHT: f64 = 0.85;
/// Weight applied to a table-comment word match.
pub const COMMENT_WEIGHT: f64 = 0.90;

/// What part of a table a keyword matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTarget {
    Table,
    Comment,
    Column,
}

impl fmt::Display for MatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchTarget::Table => f.write_str("table"),
            MatchTarget::Comment => f.write_str("comment"),
            MatchTarget::Column => f.write_str("column"),
        }
    }
}

/// Best match of any keyword against one table.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate<'a> {
    #[serde(skip)]
    pub table: &'a TableInfo,
    pub keyword: String,
    pub entity_name: String,
    pub score: f64,
    pub kind: MatchKind,
    pub target: MatchTarget,
    /// Text the keyword was scored against (table name, comment or column name)
    pub matched_on: String,
}

impl fmt::Display for MatchCandidate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}_{} on '{}', {:.2})",
            self.entity_name, self.kind, self.target, self.matched_on, self.score
        )
    }
}

/// Deterministic table lookup: exact, then containment, then singular/plural.
pub fn find_table<'a>(schema: &'a SchemaModel, name: &str) -> Option<&'a TableInfo> {
    let name = name.to_lowercase();

    if let Some(t) = schema.tables.iter().find(|t| t.name.to_lowercase() == name) {
        return Some(t);
    }

    if let Some(t) = schema
        .tables
        .iter()
        .find(|t| t.name.to_lowercase().contains(&name))
    {
        return Some(t);
    }

    let singular = name.strip_suffix('s').unwrap_or(&name);
    schema.tables.iter().find(|t| {
        let table = t.name.to_lowercase();
        table == singular || table.strip_suffix('s').unwrap_or(&table) == singular
    })
}

/// Ranks tables against `keywords` by fuzzy similarity.
///
/// Each table contributes at most one candidate: the best-scoring
/// (keyword, target) pair across its name, comment words and column
/// names. Results are sorted by score, ties keep schema order.
pub fn find_semantic_matches<'a>(
    schema: &'a SchemaModel,
    keywords: &[String],
) -> Vec<MatchCandidate<'a>> {
    let mut matches = Vec::new();

    for table in &schema.tables {
        let mut best: Option<MatchCandidate<'a>> = None;
        let mut consider = |keyword: &str, against: &str, weight: f64, target: MatchTarget, matched_on: &str| {
            let sim = similarity::score(keyword, against);
            let Some(kind) = sim.kind else { return };
            let weighted = sim.score * weight;
            if weighted < MIN_MATCH_SCORE {
                return;
            }
            if best.as_ref().map_or(true, |b| weighted > b.score) {
                best = Some(MatchCandidate {
                    table,
                    keyword: keyword.to_string(),
                    entity_name: table.name.clone(),
                    score: weighted,
                    kind,
                    target,
                    matched_on: matched_on.to_string(),
                });
            }
        };

        for keyword in keywords {
            consider(keyword, &table.name, 1.0, MatchTarget::Table, &table.name);

            if let Some(comment) = table.comment.as_deref() {
                for word in comment.to_lowercase().split_whitespace() {
                    consider(keyword, word, COMMENT_WEIGHT, MatchTarget::Comment, comment);
                }
            }

            for col in &table.columns {
                consider(keyword, &col.name, COLUMN_WEIGHT, MatchTarget::Column, &col.name);
            }
        }

        if let Some(candidate) = best {
            matches.push(candidate);
        }
    }

    // Vec::sort_by is stable
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    debug!(
        keywords = ?keywords,
        matched = matches.len(),
        top = ?matches.first().map(|m| m.to_string()),
        "Semantic table matches"
    );
    matches
}

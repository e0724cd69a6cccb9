//! String similarity scoring between a query keyword and a schema entity name.
//!
//! Every strategy is a plain function returning a weighted score; the
//! overall score is the maximum over all strategies that apply.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Suffixes removed by [`stem_word`], tried in order after plural stripping.
const STEM_SUFFIXES: &[&str] = &[
    "ology", "ation", "ment", "ness", "ity", "ing", "ed", "er", "est", "ly", "al", "ous", "ive",
    "able", "ible", "ful", "less", "ship", "ward", "wise",
];

/// Which strategy produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    ExactWord,
    Contains,
    ContainsReverse,
    Prefix,
    Stem,
    StemPartial,
    Ngram,
    Fuzzy,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchKind::Exact => "exact",
            MatchKind::ExactWord => "exact_word",
            MatchKind::Contains => "contains",
            MatchKind::ContainsReverse => "contains_reverse",
            MatchKind::Prefix => "prefix",
            MatchKind::Stem => "stem",
            MatchKind::StemPartial => "stem_partial",
            MatchKind::Ngram => "ngram",
            MatchKind::Fuzzy => "fuzzy",
        };
        f.write_str(s)
    }
}

/// Best score for one (keyword, entity) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub score: f64,
    pub kind: Option<MatchKind>,
}

impl Similarity {
    const NONE: Similarity = Similarity {
        score: 0.0,
        kind: None,
    };

    fn offer(&mut self, score: f64, kind: MatchKind) {
        if score > self.score {
            self.score = score;
            self.kind = Some(kind);
        }
    }
}

/// Scores how well `keyword` names `entity`. Deterministic, in `[0, 1]`.
pub fn score(keyword: &str, entity: &str) -> Similarity {
    let keyword = keyword.to_lowercase();
    if keyword.is_empty() {
        return Similarity::NONE;
    }
    let entity_lower = entity.to_lowercase();

    if keyword == entity_lower {
        return Similarity {
            score: 1.0,
            kind: Some(MatchKind::Exact),
        };
    }

    let entity_words = split_entity_name(entity);
    if entity_words.iter().any(|w| *w == keyword) {
        return Similarity {
            score: 0.95,
            kind: Some(MatchKind::ExactWord),
        };
    }

    let kw_len = keyword.chars().count();
    let ent_len = entity_lower.chars().count();
    let mut best = Similarity::NONE;

    if ent_len > 0 && entity_lower.contains(&keyword) {
        best.offer(
            0.85 * (kw_len as f64 / ent_len as f64) + 0.10,
            MatchKind::Contains,
        );
    }
    if ent_len >= 3 && keyword.contains(&entity_lower) {
        best.offer(
            0.80 * (ent_len as f64 / kw_len as f64) + 0.10,
            MatchKind::ContainsReverse,
        );
    }

    if ent_len > 0 && (entity_lower.starts_with(&keyword) || keyword.starts_with(&entity_lower)) {
        let overlap = kw_len.min(ent_len);
        let combined = kw_len + ent_len - overlap;
        best.offer(
            0.75 * (overlap as f64 / combined as f64) + 0.15,
            MatchKind::Prefix,
        );
    }

    let keyword_stem = stem_word(&keyword);
    let keyword_stem_len = keyword_stem.chars().count();
    for word in &entity_words {
        let word_stem = stem_word(word);
        if keyword_stem_len >= 3 && keyword_stem == word_stem {
            best.offer(0.85, MatchKind::Stem);
        }
        if word_stem.starts_with(&keyword_stem) || keyword_stem.starts_with(&word_stem) {
            let overlap = keyword_stem_len.min(word_stem.chars().count());
            if overlap >= 3 {
                best.offer(
                    0.70 * (overlap as f64 / keyword_stem_len as f64),
                    MatchKind::StemPartial,
                );
            }
        }
    }
    if keyword_stem_len >= 3 && keyword_stem == stem_word(&entity_lower) {
        best.offer(0.85, MatchKind::Stem);
    }

    let ngram = trigram_similarity(&keyword, &entity_lower);
    if ngram > 0.30 {
        best.offer(ngram * 0.80, MatchKind::Ngram);
    }

    if kw_len.abs_diff(ent_len) <= 3 && kw_len >= 4 {
        let distance = strsim::levenshtein(&keyword, &entity_lower);
        if distance <= 2 {
            let max_len = kw_len.max(ent_len) as f64;
            best.offer((1.0 - distance as f64 / max_len) * 0.70, MatchKind::Fuzzy);
        }
    }

    best
}

/// Crude suffix-stripping stem: plurals first, then one common suffix.
pub fn stem_word(word: &str) -> String {
    let mut word = word.to_lowercase();

    if word.len() > 4 && word.ends_with("ies") {
        word.truncate(word.len() - 3);
        word.push('y');
    } else if word.len() > 3 && word.ends_with("es") {
        word.truncate(word.len() - 2);
    } else if word.len() > 2 && word.ends_with('s') && !word.ends_with("ss") {
        word.truncate(word.len() - 1);
    }

    for suffix in STEM_SUFFIXES {
        if let Some(rest) = word.strip_suffix(suffix) {
            if rest.chars().count() >= 3 {
                return rest.to_string();
            }
        }
    }
    word
}

/// Splits `snake_case`, `kebab-case` and `camelCase` names into lowercase words.
pub fn split_entity_name(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, ch) in name.chars().enumerate() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            if !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            continue;
        }
        if i > 0 && ch.is_ascii_uppercase() && !current.is_empty() {
            words.push(current.to_lowercase());
            current.clear();
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current.to_lowercase());
    }
    words
}

fn trigrams(s: &str) -> HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < 3 {
        return std::iter::once(s.to_string()).collect();
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// Jaccard similarity of the character trigram sets of `a` and `b`.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let left = trigrams(a);
    let right = trigrams(b);
    let intersection = left.intersection(&right).count();
    let union = left.len() + right.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

//! Optional learned predictor consulted before the rule engine.

use std::fmt;

const VALID_STARTS: &[&str] = &[
    "select", "insert", "update", "delete", "with", "create", "alter", "drop",
];

/// SQL proposed by a predictor together with its confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub sql: String,
    pub confidence: f64,
}

/// A trained model that can propose SQL for a question.
pub trait SqlPredictor: Send + Sync {
    fn is_ready(&self) -> bool;

    /// `context` is the rendered conversation history, possibly empty.
    fn predict(&self, query: &str, context: &str) -> anyhow::Result<Prediction>;
}

/// Why a prediction was not used. Never surfaced to callers.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionRejection {
    LowConfidence(f64),
    StructurallyInvalid,
    Failed(String),
}

impl fmt::Display for PredictionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionRejection::LowConfidence(c) => write!(f, "confidence {:.2} too low", c),
            PredictionRejection::StructurallyInvalid => write!(f, "not structurally valid SQL"),
            PredictionRejection::Failed(e) => write!(f, "prediction failed: {}", e),
        }
    }
}

/// Availability of the configured predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PredictorStatus {
    pub available: bool,
    pub enabled: bool,
    pub ready: bool,
}

/// Cheap structural check: known leading keyword, `FROM` after `SELECT`,
/// balanced parentheses.
pub fn is_valid_sql_structure(sql: &str) -> bool {
    let sql = sql.trim().to_lowercase();
    if sql.is_empty() {
        return false;
    }
    if !VALID_STARTS.iter().any(|start| sql.starts_with(start)) {
        return false;
    }
    if sql.starts_with("select") && !sql.contains("from") {
        return false;
    }
    sql.matches('(').count() == sql.matches(')').count()
}

/// Accepts a prediction only above `min_confidence` and when structurally valid.
pub fn vet(
    result: anyhow::Result<Prediction>,
    min_confidence: f64,
) -> Result<String, PredictionRejection> {
    let prediction = result.map_err(|e| PredictionRejection::Failed(e.to_string()))?;
    if prediction.confidence <= min_confidence {
        return Err(PredictionRejection::LowConfidence(prediction.confidence));
    }
    if !is_valid_sql_structure(&prediction.sql) {
        return Err(PredictionRejection::StructurallyInvalid);
    }
    Ok(prediction.sql)
}

mod context;
mod engine;
mod error;
mod patterns;
mod predictor;
mod resolver;
mod search;
mod similarity;
mod sql;

pub use context::{render_conversation_context, ConversationTurn};
pub use engine::QueryEngine;
pub use error::EngineError;
pub use predictor::{
    is_valid_sql_structure, Prediction, PredictionRejection, PredictorStatus, SqlPredictor,
};
pub use resolver::{find_semantic_matches, find_table, MatchCandidate, MatchTarget, MIN_MATCH_SCORE};
pub use search::{common_columns, extract_keywords};
pub use similarity::{score, split_entity_name, stem_word, trigram_similarity, MatchKind, Similarity};
pub use sql::{quote_ident, quote_literal};

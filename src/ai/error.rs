use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no schema loaded")]
    SchemaMissing,

    /// Carries the question exactly as the caller passed it.
    #[error("could not understand query: {0}")]
    NoMatch(String),
}

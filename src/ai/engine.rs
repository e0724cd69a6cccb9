use super::error::EngineError;
use super::patterns::{self, MatchContext};
use super::predictor::{self, PredictorStatus, SqlPredictor};
use crate::config::Settings;
use crate::db::SchemaModel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Turns questions into SQL against the currently loaded schema.
///
/// The schema is held as an `Arc` snapshot. [`QueryEngine::set_schema`]
/// swaps the whole snapshot, and every call to [`QueryEngine::generate`]
/// works from the one it cloned on entry, so a concurrent swap is never
/// seen half-applied.
pub struct QueryEngine {
    schema: RwLock<Option<Arc<SchemaModel>>>,
    predictor: Option<Arc<dyn SqlPredictor>>,
    use_predictor: AtomicBool,
    settings: Settings,
}

impl QueryEngine {
    pub fn new(schema: Option<SchemaModel>) -> Self {
        Self::with_settings(schema, Settings::default())
    }

    pub fn with_settings(schema: Option<SchemaModel>, settings: Settings) -> Self {
        Self {
            schema: RwLock::new(schema.map(Arc::new)),
            predictor: None,
            use_predictor: AtomicBool::new(settings.predictor_enabled),
            settings,
        }
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn SqlPredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_schema(&self, schema: Option<SchemaModel>) {
        let next = schema.map(Arc::new);
        *self.schema.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    /// Snapshot of the loaded schema.
    pub fn schema(&self) -> Option<Arc<SchemaModel>> {
        self.schema
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_schema(&self) -> bool {
        self.schema().is_some()
    }

    /// Generates SQL for `query`. `context` is rendered conversation history
    /// and is only shown to the predictor.
    pub fn generate(&self, query: &str, context: &str) -> Result<String, EngineError> {
        let schema = self.schema().ok_or(EngineError::SchemaMissing)?;

        if let Some(sql) = self.predict(query.trim(), context) {
            return Ok(sql);
        }

        let normalized = query.trim().to_lowercase();
        let cx = MatchContext {
            schema: &schema,
            row_limit: self.settings.default_row_limit.to_string(),
            spatial_enabled: self.settings.enable_spatial_ops,
        };
        patterns::dispatch(&cx, &normalized).ok_or_else(|| EngineError::NoMatch(query.to_string()))
    }

    fn predict(&self, query: &str, context: &str) -> Option<String> {
        let predictor = self.predictor.as_ref()?;
        if !self.use_predictor.load(Ordering::Relaxed) || !predictor.is_ready() {
            return None;
        }
        match predictor::vet(
            predictor.predict(query, context),
            self.settings.predictor_min_confidence,
        ) {
            Ok(sql) => {
                debug!("Using predictor output");
                Some(sql)
            }
            Err(rejection) => {
                debug!(%rejection, "Predictor output rejected");
                None
            }
        }
    }

    pub fn set_use_predictor(&self, enabled: bool) {
        self.use_predictor.store(enabled, Ordering::Relaxed);
    }

    pub fn predictor_status(&self) -> PredictorStatus {
        PredictorStatus {
            available: self.predictor.is_some(),
            enabled: self.use_predictor.load(Ordering::Relaxed),
            ready: self.predictor.as_ref().is_some_and(|p| p.is_ready()),
        }
    }

    /// Schema outline for prompt building, empty when nothing is loaded.
    pub fn schema_context(&self) -> String {
        self.schema().map(|s| s.describe()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Prediction;
    use crate::db::TableInfo;

    struct FixedPredictor {
        sql: &'static str,
        confidence: f64,
        ready: bool,
    }

    impl SqlPredictor for FixedPredictor {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn predict(&self, _query: &str, _context: &str) -> anyhow::Result<Prediction> {
            Ok(Prediction {
                sql: self.sql.to_string(),
                confidence: self.confidence,
            })
        }
    }

    fn users() -> SchemaModel {
        SchemaModel {
            service_name: "app".into(),
            tables: vec![TableInfo::new("public", "users")],
            ..Default::default()
        }
    }

    fn engine_with(predictor: FixedPredictor) -> QueryEngine {
        QueryEngine::new(Some(users())).with_predictor(Arc::new(predictor))
    }

    #[test]
    fn missing_schema_fails_before_matching() {
        let engine = QueryEngine::new(None);
        assert_eq!(engine.generate("how many users", ""), Err(EngineError::SchemaMissing));
        assert_eq!(engine.schema_context(), "");
    }

    #[test]
    fn no_match_carries_original_text() {
        let engine = QueryEngine::new(Some(users()));
        assert_eq!(
            engine.generate("  Hi  ", ""),
            Err(EngineError::NoMatch("  Hi  ".to_string()))
        );
    }

    #[test]
    fn confident_valid_prediction_wins() {
        let engine = engine_with(FixedPredictor {
            sql: "SELECT id FROM users",
            confidence: 0.9,
            ready: true,
        });
        assert_eq!(engine.generate("how many users", "").unwrap(), "SELECT id FROM users");
    }

    #[test]
    fn rejected_prediction_falls_through() {
        let low = engine_with(FixedPredictor {
            sql: "SELECT id FROM users",
            confidence: 0.5,
            ready: true,
        });
        let invalid = engine_with(FixedPredictor {
            sql: "SELECT (id FROM users",
            confidence: 0.99,
            ready: true,
        });
        let expected = r#"SELECT COUNT(*) AS count FROM "public"."users""#;
        assert_eq!(low.generate("how many users", "").unwrap(), expected);
        assert_eq!(invalid.generate("how many users", "").unwrap(), expected);
    }

    #[test]
    fn disabled_or_unready_predictor_is_skipped() {
        let engine = engine_with(FixedPredictor {
            sql: "SELECT id FROM users",
            confidence: 0.9,
            ready: true,
        });
        engine.set_use_predictor(false);
        assert!(engine.generate("how many users", "").unwrap().contains("COUNT(*)"));
        assert_eq!(
            engine.predictor_status(),
            PredictorStatus {
                available: true,
                enabled: false,
                ready: true
            }
        );

        let unready = engine_with(FixedPredictor {
            sql: "SELECT id FROM users",
            confidence: 0.9,
            ready: false,
        });
        assert!(unready.generate("how many users", "").unwrap().contains("COUNT(*)"));
    }

    #[test]
    fn row_limit_setting_applies() {
        let settings = Settings {
            default_row_limit: 20,
            ..Default::default()
        };
        let engine = QueryEngine::with_settings(Some(users()), settings);
        assert_eq!(
            engine.generate("show users", "").unwrap(),
            r#"SELECT * FROM "public"."users" LIMIT 20"#
        );
    }
}

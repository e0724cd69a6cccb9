use crate::ai::ConversationTurn;
use crate::config::Settings;
use crate::db::SchemaModel;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS query_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        service_name TEXT NOT NULL,
        natural_query TEXT NOT NULL,
        generated_sql TEXT NOT NULL DEFAULT '',
        row_count INTEGER NOT NULL DEFAULT 0,
        execution_time_ms REAL NOT NULL DEFAULT 0,
        success BOOLEAN NOT NULL DEFAULT 1,
        error_message TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS schema_cache (
        service_name TEXT PRIMARY KEY,
        schema_json TEXT NOT NULL,
        cached_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        settings_json TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_history_service ON query_history(service_name);
";

const HISTORY_COLUMNS: &str = "id, service_name, natural_query, generated_sql, row_count, \
                               execution_time_ms, success, error_message, created_at";

/// SQLite store for question history, cached schemas and settings.
#[derive(Clone)]
pub struct LocalDb {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub service_name: String,
    pub natural_query: String,
    pub generated_sql: String,
    pub row_count: i64,
    pub execution_time_ms: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// A history row before it has been stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewHistoryEntry {
    pub service_name: String,
    pub natural_query: String,
    pub generated_sql: String,
    pub row_count: i64,
    pub execution_time_ms: f64,
    pub success: bool,
    pub error_message: Option<String>,
}

impl NewHistoryEntry {
    pub fn succeeded(service: &str, query: &str, sql: &str, row_count: i64) -> Self {
        Self {
            service_name: service.to_string(),
            natural_query: query.to_string(),
            generated_sql: sql.to_string(),
            row_count,
            success: true,
            ..Default::default()
        }
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time_ms = elapsed.as_secs_f64() * 1000.0;
        self
    }

    pub fn failed(service: &str, query: &str, error: &str) -> Self {
        Self {
            service_name: service.to_string(),
            natural_query: query.to_string(),
            success: false,
            error_message: Some(error.to_string()),
            ..Default::default()
        }
    }
}

impl HistoryEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            service_name: row.get(1)?,
            natural_query: row.get(2)?,
            generated_sql: row.get(3)?,
            row_count: row.get(4)?,
            execution_time_ms: row.get(5)?,
            success: row.get(6)?,
            error_message: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn to_turn(&self) -> ConversationTurn {
        ConversationTurn {
            user_query: self.natural_query.clone(),
            generated_sql: (!self.generated_sql.is_empty()).then(|| self.generated_sql.clone()),
            row_count: if self.success {
                usize::try_from(self.row_count).ok()
            } else {
                None
            },
        }
    }
}

impl LocalDb {
    /// Opens (or creates) the store at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Creating {}", dir.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Opening local store {}", path.display()))?;
        info!(path = %path.display(), "Opened local store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn add_history(&self, entry: &NewHistoryEntry) -> Result<i64> {
        let db = self.conn.lock().await;
        db.execute(
            "INSERT INTO query_history (service_name, natural_query, generated_sql, row_count, execution_time_ms, success, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                entry.service_name,
                entry.natural_query,
                entry.generated_sql,
                entry.row_count,
                entry.execution_time_ms,
                entry.success,
                entry.error_message
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Newest first.
    pub async fn get_history(&self, service_name: &str, limit: i64) -> Result<Vec<HistoryEntry>> {
        let db = self.conn.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM query_history
             WHERE service_name = ?1
             ORDER BY id DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(rusqlite::params![service_name, limit], HistoryEntry::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The last `n` turns for a service, oldest first.
    pub async fn recent_turns(&self, service_name: &str, n: usize) -> Result<Vec<ConversationTurn>> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let mut entries = self.get_history(service_name, limit).await?;
        entries.reverse();
        Ok(entries.iter().map(HistoryEntry::to_turn).collect())
    }

    /// Keeps only the newest `max` entries across all services. Returns the
    /// number removed.
    pub async fn trim_history(&self, max: usize) -> Result<usize> {
        let db = self.conn.lock().await;
        let max = i64::try_from(max).unwrap_or(i64::MAX);
        let removed = db.execute(
            "DELETE FROM query_history
             WHERE id NOT IN (SELECT id FROM query_history ORDER BY id DESC LIMIT ?1)",
            [max],
        )?;
        if removed > 0 {
            debug!(removed, "Trimmed query history");
        }
        Ok(removed)
    }

    pub async fn delete_history(&self, id: i64) -> Result<()> {
        let db = self.conn.lock().await;
        db.execute("DELETE FROM query_history WHERE id = ?1", [id])?;
        Ok(())
    }

    pub async fn save_schema(&self, schema: &SchemaModel) -> Result<()> {
        let json = serde_json::to_string(schema)?;
        let db = self.conn.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO schema_cache (service_name, schema_json, cached_at)
             VALUES (?1, ?2, datetime('now'))",
            rusqlite::params![schema.service_name, json],
        )?;
        debug!(
            service = %schema.service_name,
            tables = schema.tables.len(),
            "Cached schema"
        );
        Ok(())
    }

    pub async fn load_schema(&self, service_name: &str) -> Result<Option<SchemaModel>> {
        let db = self.conn.lock().await;
        let json: Option<String> = db
            .query_row(
                "SELECT schema_json FROM schema_cache WHERE service_name = ?1",
                [service_name],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => {
                let schema = SchemaModel::from_json(&json)
                    .with_context(|| format!("Parsing cached schema for {}", service_name))?;
                Ok(Some(schema))
            }
            None => Ok(None),
        }
    }

    pub async fn has_schema(&self, service_name: &str) -> Result<bool> {
        let db = self.conn.lock().await;
        let exists: bool = db.query_row(
            "SELECT EXISTS(SELECT 1 FROM schema_cache WHERE service_name = ?1)",
            [service_name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Returns whether a cached schema was removed.
    pub async fn delete_schema(&self, service_name: &str) -> Result<bool> {
        let db = self.conn.lock().await;
        let removed = db.execute("DELETE FROM schema_cache WHERE service_name = ?1", [service_name])?;
        Ok(removed > 0)
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        let db = self.conn.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO settings (id, settings_json) VALUES (1, ?1)",
            [json],
        )?;
        Ok(())
    }

    pub async fn load_settings(&self) -> Result<Option<Settings>> {
        let db = self.conn.lock().await;
        let result = db.query_row("SELECT settings_json FROM settings WHERE id = 1", [], |row| {
            row.get::<_, String>(0)
        });
        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TableInfo;

    #[tokio::test]
    async fn history_is_newest_first_per_service() {
        let db = LocalDb::open_in_memory().unwrap();
        db.add_history(&NewHistoryEntry::succeeded("a", "q1", "SELECT 1", 1)).await.unwrap();
        db.add_history(&NewHistoryEntry::succeeded("b", "other", "SELECT 2", 1)).await.unwrap();
        db.add_history(&NewHistoryEntry::failed("a", "q2", "no match")).await.unwrap();

        let history = db.get_history("a", 10).await.unwrap();
        let queries: Vec<_> = history.iter().map(|h| h.natural_query.as_str()).collect();
        assert_eq!(queries, vec!["q2", "q1"]);
        assert!(!history[0].success);
        assert_eq!(history[0].error_message.as_deref(), Some("no match"));
    }

    #[tokio::test]
    async fn recent_turns_are_oldest_first() {
        let db = LocalDb::open_in_memory().unwrap();
        for i in 1..=4 {
            let q = format!("q{}", i);
            db.add_history(&NewHistoryEntry::succeeded("svc", &q, "SELECT 1", i)).await.unwrap();
        }
        let turns = db.recent_turns("svc", 2).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user_query, "q3");
        assert_eq!(turns[1].row_count, Some(4));
    }

    #[tokio::test]
    async fn failed_turn_has_no_sql_or_rows() {
        let db = LocalDb::open_in_memory().unwrap();
        db.add_history(&NewHistoryEntry::failed("svc", "gibberish", "no match")).await.unwrap();
        let turns = db.recent_turns("svc", 3).await.unwrap();
        assert_eq!(turns, vec![ConversationTurn::new("gibberish")]);
    }

    #[tokio::test]
    async fn trim_and_delete_history() {
        let db = LocalDb::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(
                db.add_history(&NewHistoryEntry::succeeded("svc", &format!("q{}", i), "SELECT 1", 1))
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(db.trim_history(3).await.unwrap(), 2);
        db.delete_history(ids[4]).await.unwrap();
        let left: Vec<_> = db
            .get_history("svc", 10)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.natural_query)
            .collect();
        assert_eq!(left, vec!["q3", "q2"]);
    }

    #[tokio::test]
    async fn schema_cache_round_trip() {
        let db = LocalDb::open_in_memory().unwrap();
        let schema = SchemaModel {
            service_name: "gis".into(),
            tables: vec![TableInfo::new("public", "roads")],
            has_spatial_extension: true,
            ..Default::default()
        };
        assert!(!db.has_schema("gis").await.unwrap());
        db.save_schema(&schema).await.unwrap();
        assert!(db.has_schema("gis").await.unwrap());
        assert_eq!(db.load_schema("gis").await.unwrap(), Some(schema));
        assert!(db.delete_schema("gis").await.unwrap());
        assert_eq!(db.load_schema("gis").await.unwrap(), None);
    }

    #[tokio::test]
    async fn settings_row_round_trip() {
        let db = LocalDb::open_in_memory().unwrap();
        assert_eq!(db.load_settings().await.unwrap(), None);
        let settings = Settings {
            max_history_size: 10,
            ..Default::default()
        };
        db.save_settings(&settings).await.unwrap();
        assert_eq!(db.load_settings().await.unwrap(), Some(settings));
    }

    #[test]
    fn open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("pgprompt.db");
        LocalDb::open(&path).unwrap();
        assert!(path.exists());
    }
}

//! Application-level operations tying the engine to the local store.

use crate::ai::{render_conversation_context, QueryEngine};
use crate::config::Settings;
use crate::db::SchemaHarvester;
use crate::storage::{LocalDb, NewHistoryEntry};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::Client;
use tracing::{info, warn};

/// Generates SQL for `prompt` using the service's recent turns as context.
///
/// A failure is recorded in history before it is returned.
pub async fn nl_to_sql(
    engine: &QueryEngine,
    local_db: &LocalDb,
    service_name: &str,
    prompt: &str,
    settings: &Settings,
) -> Result<String> {
    let turns = local_db
        .recent_turns(service_name, settings.context_turns)
        .await?;
    let context = render_conversation_context(&turns, settings.context_turns);

    match engine.generate(prompt, &context) {
        Ok(sql) => Ok(sql),
        Err(e) => {
            let entry = NewHistoryEntry::failed(service_name, prompt, &e.to_string());
            if let Err(store_err) = local_db.add_history(&entry).await {
                warn!(error = %store_err, "Failed to record query history");
            }
            Err(e.into())
        }
    }
}

/// Records an executed query with its run time and trims history to the
/// configured size.
pub async fn record_result(
    local_db: &LocalDb,
    service_name: &str,
    prompt: &str,
    sql: &str,
    row_count: i64,
    elapsed: Duration,
    settings: &Settings,
) -> Result<i64> {
    let entry = NewHistoryEntry::succeeded(service_name, prompt, sql, row_count)
        .with_execution_time(elapsed);
    let id = local_db.add_history(&entry).await?;
    local_db.trim_history(settings.max_history_size).await?;
    Ok(id)
}

/// Loads the cached schema for `service_name` into the engine. Returns
/// whether one was found; the engine is left untouched otherwise.
pub async fn load_cached_schema(
    engine: &QueryEngine,
    local_db: &LocalDb,
    service_name: &str,
) -> Result<bool> {
    match local_db.load_schema(service_name).await? {
        Some(schema) => {
            info!(service = service_name, tables = schema.tables.len(), "Loaded cached schema");
            engine.set_schema(Some(schema));
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Harvests the live schema, caches it and swaps it into the engine.
/// Returns the number of tables harvested.
pub async fn refresh_schema(
    engine: &QueryEngine,
    local_db: &LocalDb,
    client: Arc<Client>,
    service_name: &str,
) -> Result<usize> {
    let schema = SchemaHarvester::new(client).harvest(service_name).await?;
    local_db.save_schema(&schema).await?;
    let tables = schema.tables.len();
    engine.set_schema(Some(schema));
    Ok(tables)
}

//! Natural-language to SQL for PostgreSQL and PostGIS databases.
//!
//! [`ai::QueryEngine`] turns a question and a harvested [`db::SchemaModel`]
//! into schema-grounded SQL. The `db`, `storage` and `commands` modules
//! harvest schemas from a live server, keep history and cached schemas in
//! SQLite, and bind the two together.

pub mod ai;
pub mod commands;
pub mod config;
pub mod db;
pub mod storage;

pub use ai::{EngineError, QueryEngine};
pub use config::Settings;
pub use db::SchemaModel;

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber honouring `RUST_LOG` (default `info`).
/// Safe to call more than once.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

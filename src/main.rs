//! Command line front end for the query engine.
//!
//! ```bash
//! pgprompt --schema gis.json how many roads are there
//! pgprompt --schema gis.json --describe
//! pgprompt --service gis list tables
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use pgprompt::db::{ConnectionConfig, SchemaHarvester};
use pgprompt::{QueryEngine, SchemaModel, Settings};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pgprompt")]
#[command(version)]
#[command(about = "Translate a question into SQL for a harvested PostgreSQL schema")]
struct Cli {
    /// Harvested schema as JSON
    #[arg(long, short, required_unless_present = "service")]
    schema: Option<PathBuf>,

    /// Harvest the live schema of this pg_service.conf entry instead
    #[arg(long, conflicts_with = "schema")]
    service: Option<String>,

    /// Settings file (defaults apply when absent)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print the schema outline instead of generating SQL
    #[arg(long)]
    describe: bool,

    /// The question, in plain words
    #[arg(trailing_var_arg = true, required_unless_present = "describe")]
    question: Vec<String>,
}

async fn load_schema(cli: &Cli) -> Result<SchemaModel> {
    if let Some(service) = &cli.service {
        let config = ConnectionConfig::find_service(service)?;
        let client = config.connect().await?;
        return SchemaHarvester::new(client).harvest(service).await;
    }
    let path = cli.schema.as_ref().context("--schema or --service is required")?;
    let json =
        std::fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    SchemaModel::from_json(&json).with_context(|| format!("Parsing {}", path.display()))
}

async fn run(cli: Cli) -> Result<String> {
    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let schema = load_schema(&cli).await?;

    let engine = QueryEngine::with_settings(Some(schema), settings);
    if cli.describe {
        return Ok(engine.schema_context());
    }
    Ok(engine.generate(&cli.question.join(" "), "")?)
}

#[tokio::main]
async fn main() -> ExitCode {
    pgprompt::init_logging();
    match run(Cli::parse()).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

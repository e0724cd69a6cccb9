use anyhow::{anyhow, bail, Context, Result};
use postgres_native_tls::MakeTlsConnector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Service name the harvested schema and history are keyed by
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    /// Never serialized
    #[serde(skip)]
    pub password: String,
    #[serde(default)]
    pub ssl_mode: SslMode,
    /// Extra libpq keywords from a service entry, passed through as-is
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    #[default]
    Prefer,
    Require,
    Disable,
}

impl SslMode {
    fn as_str(&self) -> &'static str {
        match self {
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::Disable => "disable",
        }
    }
}

impl FromStr for SslMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "disable" => Ok(SslMode::Disable),
            other => bail!("unsupported sslmode '{}'", other),
        }
    }
}

/// Quotes a libpq keyword value when it is empty or holds spaces, quotes or backslashes.
fn conn_value(value: &str) -> String {
    if !value.is_empty() && !value.contains(|c: char| c.is_whitespace() || c == '\'' || c == '\\') {
        return value.to_string();
    }
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Candidate pg_service.conf locations, in lookup order.
pub fn service_file_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = std::env::var_os("PGSERVICEFILE").filter(|p| !p.is_empty()) {
        paths.push(PathBuf::from(path));
    }
    if let Some(home) = std::env::var_os("HOME").filter(|p| !p.is_empty()) {
        paths.push(PathBuf::from(home).join(".pg_service.conf"));
    }
    paths.push(PathBuf::from("/etc/pg_service.conf"));
    paths.push(PathBuf::from("/etc/postgresql-common/pg_service.conf"));
    paths
}

/// Parses pg_service.conf content: `[name]` sections of `key=value` lines.
/// Blank lines, `#` comments and lines before the first section are skipped.
pub fn parse_service_file(content: &str) -> Result<Vec<ConnectionConfig>> {
    let mut services = Vec::new();
    let mut current: Option<ConnectionConfig> = None;

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            services.extend(current.take());
            current = Some(ConnectionConfig::for_service(name.trim()));
            continue;
        }
        let (Some(service), Some((key, value))) = (current.as_mut(), line.split_once('=')) else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        let line_no = index + 1;
        match key {
            "host" => service.host = value.to_string(),
            "port" => {
                service.port = value
                    .parse::<u16>()
                    .with_context(|| format!("line {}: invalid port '{}'", line_no, value))?
            }
            "dbname" => service.database = value.to_string(),
            "user" => service.user = value.to_string(),
            "password" => service.password = value.to_string(),
            "sslmode" => {
                service.ssl_mode = value
                    .parse::<SslMode>()
                    .with_context(|| format!("line {}", line_no))?
            }
            _ => {
                service.options.insert(key.to_string(), value.to_string());
            }
        }
    }
    services.extend(current);
    Ok(services)
}

impl ConnectionConfig {
    /// Empty entry for `name` with libpq's host and port defaults.
    fn for_service(name: &str) -> Self {
        Self {
            name: name.to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database: String::new(),
            user: String::new(),
            password: String::new(),
            ssl_mode: SslMode::default(),
            options: BTreeMap::new(),
        }
    }

    /// Looks `name` up in the first pg_service.conf found in
    /// [`service_file_paths`].
    pub fn find_service(name: &str) -> Result<Self> {
        let path = service_file_paths()
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| anyhow!("no pg_service.conf found in standard locations"))?;
        Self::from_service_file(&path, name)
    }

    pub fn from_service_file(path: &Path, name: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Reading {}", path.display()))?;
        let services = parse_service_file(&content)
            .with_context(|| format!("Parsing {}", path.display()))?;
        debug!(path = %path.display(), services = services.len(), "Read service file");
        services
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| anyhow!("service '{}' not found in {}", name, path.display()))
    }

    /// libpq keyword/value string. Empty host, database and user are left
    /// out; extra options follow in key order.
    pub fn connection_string(&self) -> String {
        let mut parts = Vec::new();
        if !self.host.is_empty() {
            parts.push(format!("host={}", conn_value(&self.host)));
        }
        parts.push(format!("port={}", self.port));
        if !self.database.is_empty() {
            parts.push(format!("dbname={}", conn_value(&self.database)));
        }
        if !self.user.is_empty() {
            parts.push(format!("user={}", conn_value(&self.user)));
        }
        parts.push(format!("sslmode={}", self.ssl_mode.as_str()));
        if !self.password.is_empty() {
            parts.push(format!("password={}", conn_value(&self.password)));
        }
        for (key, value) in &self.options {
            parts.push(format!("{}={}", key, conn_value(value)));
        }
        parts.join(" ")
    }

    /// Opens a client and spawns its connection driver on the runtime.
    pub async fn connect(&self) -> Result<Arc<Client>> {
        let conn_string = self.connection_string();
        let name = self.name.clone();

        let client = if self.ssl_mode == SslMode::Disable {
            let (client, connection) = tokio_postgres::connect(&conn_string, NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(service = %name, "Connection error: {}", e);
                }
            });
            client
        } else {
            let tls = MakeTlsConnector::new(native_tls::TlsConnector::builder().build()?);
            let (client, connection) = tokio_postgres::connect(&conn_string, tls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(service = %name, "Connection error: {}", e);
                }
            });
            client
        };

        info!(service = %self.name, host = %self.host, database = %self.database, "Connected");
        Ok(Arc::new(client))
    }

    /// Connects once and returns the server version string.
    pub async fn test_connection(&self) -> Result<String> {
        let client = self.connect().await?;
        let row = client.query_one("SELECT version()", &[]).await?;
        Ok(row.get(0))
    }
}

use super::model::{ColumnInfo, FunctionInfo, SchemaModel, TableInfo, ViewInfo};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_postgres::Client;
use tracing::{debug, info, warn};

/// Upper bound on harvested functions; large extensions install thousands.
const MAX_FUNCTIONS: i64 = 500;

/// Called with `(current, total, message)` as objects are harvested.
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaCounts {
    pub tables: usize,
    pub views: usize,
    pub functions: usize,
}

impl SchemaCounts {
    pub fn total(&self) -> usize {
        self.tables + self.views + self.functions
    }
}

/// Reads table, column, view and function metadata from a live database.
pub struct SchemaHarvester {
    client: Arc<Client>,
    progress: Option<ProgressCallback>,
}

impl SchemaHarvester {
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report(&self, current: usize, total: usize, message: &str) {
        debug!(current, total, "{}", message);
        if let Some(ref cb) = self.progress {
            cb(current, total, message);
        }
    }

    pub async fn count_objects(&self) -> Result<SchemaCounts> {
        let tables: i64 = self
            .client
            .query_one(
                "SELECT COUNT(*)
                 FROM information_schema.tables
                 WHERE table_type = 'BASE TABLE'
                   AND table_schema NOT IN ('pg_catalog', 'information_schema')",
                &[],
            )
            .await?
            .get(0);

        let views: i64 = self
            .client
            .query_one(
                "SELECT COUNT(*)
                 FROM information_schema.views
                 WHERE table_schema NOT IN ('pg_catalog', 'information_schema')",
                &[],
            )
            .await?
            .get(0);

        let functions: i64 = self
            .client
            .query_one(
                "SELECT COUNT(*) FROM (
                    SELECT 1 FROM pg_proc p
                    JOIN pg_namespace n ON p.pronamespace = n.oid
                    WHERE n.nspname NOT IN ('pg_catalog', 'information_schema')
                      AND p.prokind = 'f'
                    LIMIT $1
                 ) AS funcs",
                &[&MAX_FUNCTIONS],
            )
            .await?
            .get(0);

        Ok(SchemaCounts {
            tables: tables as usize,
            views: views as usize,
            functions: functions as usize,
        })
    }

    /// Harvests the complete schema of the connected database.
    pub async fn harvest(&self, service_name: &str) -> Result<SchemaModel> {
        let counts = match self.count_objects().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Failed to count schema objects: {}", e);
                SchemaCounts::default()
            }
        };
        let total = counts.total().max(1);
        let mut current = 0;

        self.report(current, total, "Checking PostGIS availability...");
        let has_spatial_extension = self.has_postgis().await.unwrap_or(false);
        let version = self.server_version().await.ok();

        self.report(current, total, "Harvesting tables...");
        let tables = self.harvest_tables(total, &mut current).await?;

        self.report(current, total, "Harvesting views...");
        let views = self.harvest_views(total, &mut current).await?;

        self.report(current, total, "Harvesting functions...");
        let functions = self.harvest_functions(total, &mut current).await?;

        self.report(total, total, "Schema harvesting complete!");
        info!(
            service = service_name,
            tables = tables.len(),
            views = views.len(),
            functions = functions.len(),
            postgis = has_spatial_extension,
            "Harvested schema"
        );

        Ok(SchemaModel {
            service_name: service_name.to_string(),
            tables,
            views,
            functions,
            has_spatial_extension,
            version,
            harvested_at: Some(Utc::now()),
        })
    }

    async fn has_postgis(&self) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'postgis')",
                &[],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn server_version(&self) -> Result<String> {
        let row = self.client.query_one("SELECT version()", &[]).await?;
        Ok(row.get(0))
    }

    async fn harvest_tables(&self, total: usize, current: &mut usize) -> Result<Vec<TableInfo>> {
        let rows = self
            .client
            .query(
                "SELECT
                    table_schema,
                    table_name,
                    obj_description((quote_ident(table_schema) || '.' || quote_ident(table_name))::regclass)
                 FROM information_schema.tables
                 WHERE table_type = 'BASE TABLE'
                   AND table_schema NOT IN ('pg_catalog', 'information_schema')
                 ORDER BY table_schema, table_name",
                &[],
            )
            .await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let schema_name: String = row.get(0);
            let name: String = row.get(1);
            let comment: Option<String> = row.get(2);
            let columns = self.harvest_columns(&schema_name, &name).await?;

            *current += 1;
            self.report(*current, total, &format!("Table: {}.{}", schema_name, name));

            tables.push(TableInfo {
                schema_name,
                name,
                columns,
                comment: non_empty(comment),
            });
        }
        Ok(tables)
    }

    async fn harvest_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = self
            .client
            .query(
                "SELECT
                    c.column_name,
                    c.data_type,
                    c.is_nullable = 'YES' as is_nullable,
                    COALESCE(tc.constraint_type = 'PRIMARY KEY', false) as is_primary_key,
                    COALESCE(tc.constraint_type = 'FOREIGN KEY', false) as is_foreign_key,
                    ccu.table_name as foreign_table,
                    ccu.column_name as foreign_column,
                    col_description((quote_ident(c.table_schema) || '.' || quote_ident(c.table_name))::regclass, c.ordinal_position::int) as comment,
                    c.udt_name
                 FROM information_schema.columns c
                 LEFT JOIN information_schema.key_column_usage kcu
                    ON c.table_schema = kcu.table_schema
                    AND c.table_name = kcu.table_name
                    AND c.column_name = kcu.column_name
                 LEFT JOIN information_schema.table_constraints tc
                    ON kcu.constraint_name = tc.constraint_name
                    AND kcu.table_schema = tc.table_schema
                 LEFT JOIN information_schema.constraint_column_usage ccu
                    ON tc.constraint_name = ccu.constraint_name
                    AND tc.constraint_type = 'FOREIGN KEY'
                 WHERE c.table_schema = $1 AND c.table_name = $2
                 ORDER BY c.ordinal_position",
                &[&schema, &table],
            )
            .await?;

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get(0);
            // Constraint joins yield one row per constraint
            if !seen.insert(name.clone()) {
                continue;
            }
            let data_type: String = row.get(1);
            let udt_name: String = row.get(8);
            let mut col = ColumnInfo {
                name,
                data_type,
                is_nullable: row.get(2),
                is_primary_key: row.get(3),
                is_foreign_key: row.get(4),
                fk_table: row.get(5),
                fk_column: row.get(6),
                comment: non_empty(row.get(7)),
                ..Default::default()
            };

            if let Some(kind) = spatial_kind(&col.data_type, &udt_name) {
                col.is_geometry = true;
                match self.geometry_info(kind, schema, table, &col.name).await {
                    Ok(Some((geometry_type, srid))) => {
                        col.geometry_type = Some(geometry_type);
                        col.srid = Some(srid);
                    }
                    Ok(None) => {}
                    Err(e) => debug!("No {} entry for {}.{}.{}: {}", kind.catalog(), schema, table, col.name, e),
                }
            }
            columns.push(col);
        }
        Ok(columns)
    }

    async fn geometry_info(
        &self,
        kind: SpatialKind,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<Option<(String, i32)>> {
        let query = match kind {
            SpatialKind::Geometry => {
                "SELECT type, srid
                 FROM geometry_columns
                 WHERE f_table_schema = $1 AND f_table_name = $2 AND f_geometry_column = $3"
            }
            SpatialKind::Geography => {
                "SELECT type, srid
                 FROM geography_columns
                 WHERE f_table_schema = $1 AND f_table_name = $2 AND f_geography_column = $3"
            }
        };
        let row = self
            .client
            .query_opt(query, &[&schema, &table, &column])
            .await?;
        Ok(row.map(|r| (r.get(0), r.get(1))))
    }

    async fn harvest_views(&self, total: usize, current: &mut usize) -> Result<Vec<ViewInfo>> {
        let rows = self
            .client
            .query(
                "SELECT
                    table_schema,
                    table_name,
                    obj_description((quote_ident(table_schema) || '.' || quote_ident(table_name))::regclass),
                    view_definition
                 FROM information_schema.views
                 WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
                 ORDER BY table_schema, table_name",
                &[],
            )
            .await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            let schema_name: String = row.get(0);
            let name: String = row.get(1);
            let columns = match self.harvest_columns(&schema_name, &name).await {
                Ok(columns) => columns,
                Err(e) => {
                    warn!("Skipping columns of view {}.{}: {}", schema_name, name, e);
                    Vec::new()
                }
            };

            *current += 1;
            self.report(*current, total, &format!("View: {}.{}", schema_name, name));

            views.push(ViewInfo {
                schema_name,
                name,
                columns,
                comment: non_empty(row.get(2)),
                definition: non_empty(row.get(3)),
            });
        }
        Ok(views)
    }

    async fn harvest_functions(
        &self,
        total: usize,
        current: &mut usize,
    ) -> Result<Vec<FunctionInfo>> {
        let rows = self
            .client
            .query(
                "SELECT
                    n.nspname,
                    p.proname,
                    pg_get_function_result(p.oid),
                    pg_get_function_arguments(p.oid),
                    obj_description(p.oid)
                 FROM pg_proc p
                 JOIN pg_namespace n ON p.pronamespace = n.oid
                 WHERE n.nspname NOT IN ('pg_catalog', 'information_schema')
                   AND p.prokind = 'f'
                 ORDER BY n.nspname, p.proname
                 LIMIT $1",
                &[&MAX_FUNCTIONS],
            )
            .await?;

        let mut functions = Vec::with_capacity(rows.len());
        for row in &rows {
            let f = FunctionInfo {
                schema_name: row.get(0),
                name: row.get(1),
                return_type: row.get::<_, Option<String>>(2).unwrap_or_default(),
                arguments: row.get::<_, Option<String>>(3).unwrap_or_default(),
                comment: non_empty(row.get(4)),
            };
            *current += 1;
            self.report(*current, total, &format!("Function: {}.{}", f.schema_name, f.name));
            functions.push(f);
        }
        Ok(functions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialKind {
    Geometry,
    Geography,
}

impl SpatialKind {
    /// PostGIS catalog view holding type and SRID for this kind.
    fn catalog(self) -> &'static str {
        match self {
            SpatialKind::Geometry => "geometry_columns",
            SpatialKind::Geography => "geography_columns",
        }
    }
}

/// PostGIS columns surface as `USER-DEFINED` in information_schema, as do
/// enums, citext and hstore. Only the udt name tells them apart.
pub fn spatial_kind(data_type: &str, udt_name: &str) -> Option<SpatialKind> {
    let name = if data_type == "USER-DEFINED" {
        udt_name
    } else {
        data_type
    };
    match name {
        "geometry" => Some(SpatialKind::Geometry),
        "geography" => Some(SpatialKind::Geography),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

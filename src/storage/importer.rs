//! Geometry import through GDAL's ogr2ogr
//!
//! The import is idempotent: the target table is dropped first and ogr2ogr
//! runs with `-overwrite`, so re-importing the same upload converges on the
//! same table.

use crate::core::config::ImportConfig;
use crate::core::error::PublishError;
use crate::core::traits::{GeometryImporter, GeometryLayer};
use crate::security::{CommandError, SafeCommandExecutor};
use crate::storage::db_context::DbContext;
use crate::storage::repository::{PostgisRepository, TableMaintenance};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

pub struct Ogr2OgrImporter {
    connection: SecretString,
    database: String,
    tables: Arc<dyn TableMaintenance>,
    executor: SafeCommandExecutor,
    program: String,
}

impl Ogr2OgrImporter {
    pub fn new(db: &DbContext, config: &ImportConfig) -> Result<Self, PublishError> {
        Self::with_tables(
            db.ogr_connection_string(),
            db.redacted_url(),
            Arc::new(PostgisRepository::new(db.pool().clone())),
            config,
        )
    }

    /// Importer writing through `connection`, with table housekeeping
    /// delegated to `tables`. `database` is only used in logs.
    pub fn with_tables(
        connection: SecretString,
        database: impl Into<String>,
        tables: Arc<dyn TableMaintenance>,
        config: &ImportConfig,
    ) -> Result<Self, PublishError> {
        if !SafeCommandExecutor::is_allowed(&config.ogr2ogr_path) {
            return Err(PublishError::configuration(format!(
                "import.ogr2ogrPath must point to ogr2ogr, got '{}'",
                config.ogr2ogr_path
            )));
        }

        let mut executor = SafeCommandExecutor::new(std::env::temp_dir())
            .map_err(|e| PublishError::configuration(e.to_string()))?;
        if config.timeout_secs > 0 {
            executor.set_timeout(Duration::from_secs(config.timeout_secs));
        }

        Ok(Self {
            connection,
            database: database.into(),
            tables,
            executor,
            program: config.ogr2ogr_path.clone(),
        })
    }

    fn tool_error(&self, exit_code: Option<i32>, stderr: impl Into<String>) -> PublishError {
        PublishError::ToolExecution {
            tool: "ogr2ogr".to_string(),
            exit_code,
            stderr: stderr.into(),
        }
    }
}

/// Argument vector for importing `layer` into `schema`
pub fn build_ogr2ogr_args(layer: &GeometryLayer, schema: &str, connection: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        "PostgreSQL".to_string(),
        connection.to_string(),
        layer.source_path.to_string_lossy().into_owned(),
        "-nln".to_string(),
        format!("{}.{}", schema, layer.name),
        "-lco".to_string(),
        "GEOMETRY_NAME=geom".to_string(),
        "-lco".to_string(),
        "FID=fid".to_string(),
        "-nlt".to_string(),
        "PROMOTE_TO_MULTI".to_string(),
        "-overwrite".to_string(),
        "-t_srs".to_string(),
        format!("EPSG:{}", layer.spatial_reference_id),
    ]
}

#[async_trait]
impl GeometryImporter for Ogr2OgrImporter {
    async fn import_geometry(
        &self,
        layer: &GeometryLayer,
        schema: &str,
    ) -> Result<(), PublishError> {
        if !layer.source_path.is_file() {
            return Err(PublishError::archive(format!(
                "shapefile not found: {}",
                layer.source_path.display()
            )));
        }

        self.tables.drop_table_if_exists(&layer.name, schema).await?;

        let args = build_ogr2ogr_args(layer, schema, self.connection.expose_secret());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        tracing::info!(
            layer = %layer.name,
            schema,
            srid = layer.spatial_reference_id,
            database = %self.database,
            "importing geometry"
        );

        let output = self
            .executor
            .execute(&self.program, &arg_refs)
            .await
            .map_err(|e| match e {
                CommandError::Timeout(limit) => {
                    self.tool_error(None, format!("timed out after {}s", limit.as_secs()))
                }
                other => self.tool_error(None, other.to_string()),
            })?;

        // ogr2ogr reports the fatal error after any warnings, so stderr is kept whole.
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.tool_error(output.status.code(), stderr.trim()));
        }

        tracing::info!(layer = %layer.name, schema, "geometry imported");
        Ok(())
    }
}

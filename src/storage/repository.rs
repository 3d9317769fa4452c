//! Relational side of the import: table housekeeping and the spatial catalog

use crate::core::error::PublishError;
use crate::core::traits::{GeometryColumn, LayerCatalog};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

const LIST_LAYERS_SQL: &str = r#"
    SELECT
        f_table_schema::text AS schema,
        f_table_name::text AS table_name,
        f_geometry_column::text AS geometry_column,
        coord_dimension AS dimension,
        srid,
        type::text AS geometry_type
    FROM public.geometry_columns
    WHERE f_table_schema = $1
    ORDER BY f_table_name
"#;

/// Table housekeeping the importer needs before ogr2ogr writes a layer
#[async_trait]
pub trait TableMaintenance: Send + Sync {
    async fn drop_table_if_exists(&self, table: &str, schema: &str) -> Result<(), PublishError>;
}

#[derive(Debug, Clone)]
pub struct PostgisRepository {
    pool: PgPool,
}

impl PostgisRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TableMaintenance for PostgisRepository {
    async fn drop_table_if_exists(&self, table: &str, schema: &str) -> Result<(), PublishError> {
        let sql = drop_table_sql(table, schema);
        tracing::debug!(%sql, "dropping previous table");
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LayerCatalog for PostgisRepository {
    async fn list_layers(&self, schema: &str) -> Result<Vec<GeometryColumn>, PublishError> {
        let rows = sqlx::query(LIST_LAYERS_SQL)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;

        let mut layers = Vec::with_capacity(rows.len());
        for row in rows {
            layers.push(GeometryColumn {
                schema: row.try_get("schema")?,
                table: row.try_get("table_name")?,
                geometry_column: row.try_get("geometry_column")?,
                dimension: row.try_get("dimension")?,
                srid: row.try_get("srid")?,
                geometry_type: row.try_get("geometry_type")?,
            });
        }

        tracing::debug!(schema, count = layers.len(), "listed geometry columns");
        Ok(layers)
    }
}

fn drop_table_sql(table: &str, schema: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {}.{} CASCADE",
        quote_identifier(schema),
        quote_identifier(table)
    )
}

/// Double-quote an SQL identifier, doubling embedded quotes
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

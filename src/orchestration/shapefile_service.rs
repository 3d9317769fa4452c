//! Upload pipeline: archive → PostGIS import → map-server publication

use crate::core::config::AppConfig;
use crate::core::error::PublishError;
use crate::core::traits::{
    GeometryColumn, GeometryImporter, GeometryLayer, LayerCatalog, MapServerAdmin,
    PublicationResult, PublicationTarget,
};
use crate::geoserver::GeoServerClient;
use crate::ingest::{ensure_zip_extension, prepare_upload};
use crate::orchestration::layer_publisher::{MirrorRequest, PublicationOrchestrator, PublishPlan};
use crate::storage::{DbContext, Ogr2OgrImporter, PostgisRepository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Status reported for a completed upload
pub const STATUS_PUBLISHED: &str = "published";

/// One shapefile upload as submitted by the caller
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub archive: PathBuf,
    /// Primary workspace; configuration default when `None`
    pub workspace: Option<String>,
    /// Primary datastore; configuration default when `None`
    pub datastore: Option<String>,
    /// Target SRID; `import.defaultSrid` when `None`
    pub srid: Option<i32>,
    pub publish_on_inde: bool,
    /// Publish an already imported table without re-running ogr2ogr
    pub skip_import: bool,
}

impl UploadRequest {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            ..Default::default()
        }
    }
}

/// Result reported to the caller after a successful upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub layer: String,
    pub workspace: String,
    pub datastore: String,
    pub database_table: String,
    pub status: String,
    pub published_at: DateTime<Utc>,
    pub geoserver: PublicationResult,
}

pub struct ShapefileService {
    config: AppConfig,
    importer: Arc<dyn GeometryImporter>,
    catalog: Arc<dyn LayerCatalog>,
    orchestrator: PublicationOrchestrator,
}

impl ShapefileService {
    pub fn new(
        config: AppConfig,
        importer: Arc<dyn GeometryImporter>,
        catalog: Arc<dyn LayerCatalog>,
        admin: Arc<dyn MapServerAdmin>,
    ) -> Self {
        Self {
            config,
            importer,
            catalog,
            orchestrator: PublicationOrchestrator::new(admin),
        }
    }

    /// Wire the PostGIS importer, catalog and GeoServer client from configuration
    ///
    /// Must be called inside a Tokio runtime; no connection is opened yet.
    pub fn from_config(config: AppConfig) -> Result<Self, PublishError> {
        let db = DbContext::new(&config.database)?;
        let importer = Ogr2OgrImporter::new(&db, &config.import)?;
        let catalog = PostgisRepository::new(db.pool().clone());
        let admin = GeoServerClient::new(&config.geoserver)?;

        Ok(Self::new(
            config,
            Arc::new(importer),
            Arc::new(catalog),
            Arc::new(admin),
        ))
    }

    /// Drop and re-import the layer's table into the configured schema
    pub async fn import_to_postgis(&self, layer: &GeometryLayer) -> Result<(), PublishError> {
        let schema = self.config.import_schema();
        self.importer.import_geometry(layer, &schema).await
    }

    /// Geometry catalog of `schema`, defaulting to the import schema
    pub async fn list_layers(
        &self,
        schema: Option<&str>,
    ) -> Result<Vec<GeometryColumn>, PublishError> {
        let schema = schema
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.config.import_schema());
        self.catalog.list_layers(&schema).await
    }

    /// Run the whole upload pipeline for one archive
    ///
    /// Every precondition that needs no I/O (archive name, targets, mirror
    /// configuration) is checked before the archive is extracted.
    pub async fn process_upload(
        &self,
        request: &UploadRequest,
    ) -> Result<UploadResult, PublishError> {
        ensure_zip_extension(&request.archive)?;

        let target = self.primary_target(request)?;
        let mirror = if request.publish_on_inde {
            Some(self.mirror_request()?)
        } else {
            None
        };
        let srid = request.srid.unwrap_or(self.config.import.default_srid);

        let archive = request.archive.clone();
        let temp_root = self.config.upload.temp_root();
        let extracted = tokio::task::spawn_blocking(move || prepare_upload(&archive, &temp_root))
            .await
            .map_err(|e| PublishError::Io(std::io::Error::other(e)))??;

        let layer = GeometryLayer::new(&extracted.layer_name, &extracted.shp_path, srid);

        if request.skip_import {
            tracing::info!(layer = %layer.name, "skipping geometry import");
        } else {
            self.import_to_postgis(&layer).await?;
        }

        let mut plan = PublishPlan::primary_only(target.clone());
        if let Some(mirror) = mirror {
            plan = plan.with_mirror(mirror);
        }
        let geoserver = self
            .orchestrator
            .publish(&layer, extracted.sld_body.clone(), &plan)
            .await?;

        Ok(UploadResult {
            layer: layer.name.clone(),
            workspace: target.workspace,
            datastore: target.datastore,
            database_table: layer.name,
            status: STATUS_PUBLISHED.to_string(),
            published_at: Utc::now(),
            geoserver,
        })
    }

    fn primary_target(&self, request: &UploadRequest) -> Result<PublicationTarget, PublishError> {
        let pick = |requested: &Option<String>, configured: &str| {
            requested
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(configured.trim())
                .to_string()
        };

        let workspace = pick(&request.workspace, &self.config.geoserver.workspace);
        let datastore = pick(&request.datastore, &self.config.geoserver.datastore);

        if workspace.is_empty() || datastore.is_empty() {
            return Err(PublishError::configuration(
                "GeoServer workspace/datastore are not configured",
            ));
        }

        Ok(PublicationTarget::new(workspace, datastore))
    }

    fn mirror_request(&self) -> Result<MirrorRequest, PublishError> {
        if !self.config.inde.enabled {
            return Err(PublishError::configuration(
                "INDE publication was requested but is disabled in configuration",
            ));
        }

        Ok(MirrorRequest {
            workspace: self.config.inde.workspace.clone(),
            datastore: self.config.inde.datastore.clone(),
        })
    }
}

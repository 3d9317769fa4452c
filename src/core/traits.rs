//! Core traits and types for shapefile publishing
//!
//! This module defines the data model shared by the import step and the
//! publication workflow, and the capability traits implemented by the
//! map-server client, the geometry importer and the relational catalog.

use crate::core::error::PublishError;
use crate::core::naming::build_basic_polygon_sld;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Geometry
// ============================================================================

/// A shapefile layer ready for import and publication
///
/// `name` is always the output of
/// [`sanitize_layer_name`](crate::core::naming::sanitize_layer_name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryLayer {
    pub name: String,
    pub source_path: PathBuf,
    pub spatial_reference_id: i32,
}

impl GeometryLayer {
    pub fn new(name: impl Into<String>, source_path: impl Into<PathBuf>, srid: i32) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            spatial_reference_id: srid,
        }
    }
}

/// One row of the spatial catalog (`geometry_columns`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryColumn {
    pub schema: String,
    pub table: String,
    pub geometry_column: String,
    pub dimension: i32,
    pub srid: i32,
    #[serde(rename = "type")]
    pub geometry_type: String,
}

// ============================================================================
// Publication
// ============================================================================

/// Workspace and datastore pair a layer is published into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationTarget {
    pub workspace: String,
    pub datastore: String,
}

impl PublicationTarget {
    pub fn new(workspace: impl Into<String>, datastore: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            datastore: datastore.into(),
        }
    }

    /// Build the mirror target, rejecting missing fields
    ///
    /// Requesting a mirror without both fields configured is a configuration
    /// error, never a silent skip.
    pub fn mirror(
        workspace: Option<&str>,
        datastore: Option<&str>,
    ) -> Result<Self, PublishError> {
        let workspace = workspace.map(str::trim).unwrap_or_default();
        let datastore = datastore.map(str::trim).unwrap_or_default();

        if workspace.is_empty() || datastore.is_empty() {
            return Err(PublishError::configuration(
                "INDE workspace/datastore are not configured",
            ));
        }

        Ok(Self::new(workspace, datastore))
    }

    /// Qualified `<workspace>:<layer>` reference
    pub fn layer_ref(&self, layer: &str) -> String {
        format!("{}:{}", self.workspace, layer)
    }
}

/// Style reference and body published alongside a layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleDescriptor {
    pub style_name: String,
    pub style_filename: String,
    pub sld_body: String,
}

impl StyleDescriptor {
    /// Derive the style for `layer`, falling back to a generated polygon style
    pub fn for_layer(layer: &str, sld_body: Option<String>) -> Self {
        let sld_body = sld_body
            .filter(|body| !body.trim().is_empty())
            .unwrap_or_else(|| build_basic_polygon_sld(layer));

        Self {
            style_name: format!("{}_style", layer),
            style_filename: format!("{}.sld", layer),
            sld_body,
        }
    }
}

/// Result of the publication sequence for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationOutcome {
    pub layer_ref: String,
    pub style_name: String,
    pub style_filename: String,
    pub sld_validated: bool,
    pub sld_length: Option<usize>,
    pub layer_http_status: Option<u16>,
}

/// Aggregate of the primary and optional mirror publications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationResult {
    pub primary: PublicationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror: Option<PublicationOutcome>,
}

// ============================================================================
// Map-Server Admin Trait
// ============================================================================

/// Administrative operations of the map server used by the publication workflow
///
/// Mutating operations are idempotent where noted and raise
/// [`PublishError`] on failure. The two observational probes never raise:
/// their failures are encoded in the returned value.
#[async_trait]
pub trait MapServerAdmin: Send + Sync {
    /// Register `name` in `workspace`, succeeding if it already exists
    ///
    /// Fails with `NotFound` when the workspace does not exist.
    async fn ensure_style_registered(
        &self,
        name: &str,
        workspace: &str,
        filename: &str,
    ) -> Result<(), PublishError>;

    /// Replace the SLD body of a registered style
    async fn upload_style_body(
        &self,
        name: &str,
        workspace: &str,
        sld_body: &str,
    ) -> Result<(), PublishError>;

    /// Publish `layer` from `datastore`, succeeding if it already exists
    async fn ensure_feature_type_published(
        &self,
        workspace: &str,
        datastore: &str,
        layer: &str,
    ) -> Result<(), PublishError>;

    /// Make `style_name` the default style of `layer`
    async fn bind_default_style(
        &self,
        layer: &str,
        workspace: &str,
        style_name: &str,
    ) -> Result<(), PublishError>;

    /// Length in characters of the stored SLD body, `None` when unavailable
    async fn fetch_style_body_length(&self, workspace: &str, name: &str) -> Option<usize>;

    /// HTTP status of the published layer, `None` when the server was unreachable
    async fn probe_layer_status(&self, layer: &str, workspace: &str) -> Option<u16>;
}

// ============================================================================
// Storage Traits
// ============================================================================

/// Loads shapefile geometry into the relational store
#[async_trait]
pub trait GeometryImporter: Send + Sync {
    /// Import `layer` into `schema`, dropping any previous table of the same name
    async fn import_geometry(&self, layer: &GeometryLayer, schema: &str)
    -> Result<(), PublishError>;
}

/// Read access to the spatial catalog
#[async_trait]
pub trait LayerCatalog: Send + Sync {
    async fn list_layers(&self, schema: &str) -> Result<Vec<GeometryColumn>, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_descriptor_names() {
        let style = StyleDescriptor::for_layer("rio_grande", None);

        assert_eq!(style.style_name, "rio_grande_style");
        assert_eq!(style.style_filename, "rio_grande.sld");
        assert!(style.sld_body.contains("<sld:Name>rio_grande_style</sld:Name>"));
        assert!(style.sld_body.len() >= 50);
    }

    #[test]
    fn test_style_descriptor_prefers_supplied_body() {
        let body = "<StyledLayerDescriptor>custom</StyledLayerDescriptor>".to_string();
        let style = StyleDescriptor::for_layer("rivers", Some(body.clone()));

        assert_eq!(style.sld_body, body);
    }

    #[test]
    fn test_style_descriptor_ignores_blank_body() {
        let style = StyleDescriptor::for_layer("rivers", Some("  \n".to_string()));

        assert!(style.sld_body.contains("PolygonSymbolizer"));
    }

    #[test]
    fn test_mirror_target_requires_both_fields() {
        assert!(matches!(
            PublicationTarget::mirror(Some("inde"), Some("")),
            Err(PublishError::Configuration { .. })
        ));
        assert!(matches!(
            PublicationTarget::mirror(None, Some("inde_ds")),
            Err(PublishError::Configuration { .. })
        ));

        let target = PublicationTarget::mirror(Some("inde"), Some("inde_ds")).unwrap();
        assert_eq!(target, PublicationTarget::new("inde", "inde_ds"));
    }

    #[test]
    fn test_layer_ref() {
        let target = PublicationTarget::new("zcm", "zcm_ds");
        assert_eq!(target.layer_ref("rio_grande"), "zcm:rio_grande");
    }

    #[test]
    fn test_publication_result_serialization() {
        let outcome = PublicationOutcome {
            layer_ref: "zcm:rio_grande".to_string(),
            style_name: "rio_grande_style".to_string(),
            style_filename: "rio_grande.sld".to_string(),
            sld_validated: true,
            sld_length: Some(1200),
            layer_http_status: Some(200),
        };
        let result = PublicationResult {
            primary: outcome,
            mirror: None,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["primary"]["layerRef"], "zcm:rio_grande");
        assert_eq!(json["primary"]["sldValidated"], true);
        assert_eq!(json["primary"]["layerHttpStatus"], 200);
        assert!(json.get("mirror").is_none());
    }

    #[test]
    fn test_geometry_column_type_field() {
        let column = GeometryColumn {
            schema: "zcm".to_string(),
            table: "rios".to_string(),
            geometry_column: "geom".to_string(),
            dimension: 2,
            srid: 4674,
            geometry_type: "MULTIPOLYGON".to_string(),
        };

        let json = serde_json::to_string(&column).unwrap();
        assert!(json.contains("\"type\":\"MULTIPOLYGON\""));
        assert!(json.contains("\"geometryColumn\":\"geom\""));
    }
}

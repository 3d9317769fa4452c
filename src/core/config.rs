//! Configuration structures and types for shapefile-publisher
//!
//! This module provides type-safe configuration with serde support. Secrets
//! are held in `secrecy::SecretString` so they never end up in `Debug` output.

use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration object
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// PostGIS connection settings
    pub database: DatabaseConfig,

    /// GeoServer REST API settings (primary target)
    pub geoserver: GeoServerConfig,

    /// Mirror ("INDE") target settings
    pub inde: IndeConfig,

    /// Upload extraction settings
    pub upload: UploadConfig,

    /// Geometry import settings
    pub import: ImportConfig,

    /// Resubmission policy applied by the command-line boundary
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Schema the geometry tables are imported into
    ///
    /// Defaults to the primary workspace name so that tables and layers
    /// share a namespace, then to `public`.
    pub fn import_schema(&self) -> String {
        self.import
            .schema
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                Some(self.geoserver.workspace.clone()).filter(|s| !s.trim().is_empty())
            })
            .unwrap_or_else(|| "public".to_string())
    }
}

/// PostGIS connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub name: String,
    /// Maximum pooled connections used for catalog queries
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: SecretString::from(String::new()),
            name: String::new(),
            max_connections: 2,
        }
    }
}

/// GeoServer REST API settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeoServerConfig {
    /// REST endpoint, e.g. `http://localhost:8080/geoserver/rest`
    pub base_url: String,
    pub workspace: String,
    pub datastore: String,
    pub user: String,
    pub password: SecretString,
    pub timeout_secs: u64,
}

impl GeoServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeoServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            workspace: String::new(),
            datastore: String::new(),
            user: "admin".to_string(),
            password: SecretString::from(String::new()),
            timeout_secs: 30,
        }
    }
}

/// Mirror target settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct IndeConfig {
    pub enabled: bool,
    pub workspace: Option<String>,
    pub datastore: Option<String>,
}

impl Default for IndeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workspace: Some("inde".to_string()),
            datastore: Some("inde_ds".to_string()),
        }
    }
}

/// Upload extraction settings
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadConfig {
    /// Root for extraction workspaces (OS temp dir when absent)
    pub temp_path: Option<PathBuf>,
}

impl UploadConfig {
    pub fn temp_root(&self) -> PathBuf {
        self.temp_path
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join("shapefile-publisher")
    }
}

/// Geometry import settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportConfig {
    /// Target schema (defaults to the primary workspace)
    pub schema: Option<String>,
    pub default_srid: i32,
    /// ogr2ogr executable name or absolute path
    pub ogr2ogr_path: String,
    pub timeout_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            schema: None,
            default_srid: 4674,
            ogr2ogr_path: "ogr2ogr".to_string(),
            timeout_secs: 600,
        }
    }
}

/// Resubmission policy (one attempt means no retry)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

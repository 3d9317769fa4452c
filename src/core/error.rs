//! Error handling for shapefile publishing
//!
//! This module provides the error kinds raised by the import and publication
//! workflow, with recovery guidance, using the thiserror crate.

use serde::Serialize;
use thiserror::Error;

/// Maximum number of characters kept from an upstream response body
pub const BODY_PREVIEW_LIMIT: usize = 500;

/// Main error type for import and publication operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Caller-fixable configuration problems
    #[error("configuration error: {message}")]
    Configuration { message: String },

    // Prerequisite resources on the map server
    #[error("{resource} not found at {url}")]
    NotFound { resource: String, url: String },

    // Unexpected responses from mutating map-server calls
    #[error("{method} {url} failed with HTTP {status_code}: {message}")]
    Upstream {
        status_code: u16,
        method: String,
        url: String,
        body_preview: String,
        message: String,
    },

    // Transport failures (timeout, refused connection) on mutating calls
    #[error("{method} {url} could not be completed: {message}")]
    Network {
        method: String,
        url: String,
        message: String,
    },

    // External geometry importer
    #[error(
        "{tool} failed{}: {stderr}",
        exit_code.map(|c| format!(" with exit code {}", c)).unwrap_or_default()
    )]
    ToolExecution {
        tool: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    // Uploaded archive problems
    #[error("invalid archive: {message}")]
    Archive { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PublishError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Network { .. } => "NETWORK_ERROR",
            Self::ToolExecution { .. } => "TOOL_EXECUTION_ERROR",
            Self::Archive { .. } => "ARCHIVE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Check if resubmitting the same request could succeed
    ///
    /// Only transport failures and server-side upstream errors qualify. The
    /// publication steps are idempotent, so a resubmission never duplicates
    /// map-server state.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Upstream { status_code, .. } => *status_code >= 500 || *status_code == 429,
            _ => false,
        }
    }

    /// Process exit code used by the command-line boundary
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } | Self::Archive { .. } => 2,
            Self::NotFound { .. } => 3,
            Self::Upstream { .. } | Self::Network { .. } => 4,
            Self::ToolExecution { .. } => 5,
            Self::Io(_) | Self::Database(_) => 1,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Configuration { .. } => vec![
                "Check the configuration file and PUBLISHER_* environment variables",
                "Run `shapefile-publisher check` to validate the configuration",
            ],
            Self::NotFound { .. } => vec![
                "Create the workspace on the map server before publishing",
                "Verify the workspace name passed with --workspace",
            ],
            Self::Upstream { .. } => vec![
                "Inspect the response body preview for the server's reason",
                "Verify the map-server credentials and datastore configuration",
            ],
            Self::Network { .. } => vec![
                "Check that the map server is reachable from this host",
                "Resubmit the upload; publication steps are idempotent",
            ],
            Self::ToolExecution { .. } => vec![
                "Check that GDAL (ogr2ogr) is installed and on PATH",
                "Verify database connectivity and the target schema",
            ],
            Self::Archive { .. } => {
                vec!["Upload a .zip containing at least .shp, .shx and .dbf files"]
            }
            Self::Io(_) => vec!["Check permissions of the upload temporary directory"],
            Self::Database(_) => vec!["Check the database section of the configuration"],
        }
    }

    /// Structured representation for the boundary layer
    pub fn to_payload(&self) -> ErrorPayload {
        let upstream = match self {
            Self::Upstream {
                status_code,
                method,
                url,
                body_preview,
                ..
            } => Some(UpstreamDetails {
                status: *status_code,
                method: method.clone(),
                url: url.clone(),
                body: body_preview.clone(),
            }),
            _ => None,
        };

        ErrorPayload {
            error: self.kind_name(),
            code: self.code(),
            message: self.to_string(),
            upstream,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "ConfigurationError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Upstream { .. } => "UpstreamError",
            Self::Network { .. } => "NetworkError",
            Self::ToolExecution { .. } => "ToolExecutionError",
            Self::Archive { .. } => "ArchiveError",
            Self::Io(_) => "IoError",
            Self::Database(_) => "DatabaseError",
        }
    }
}

/// Structured error body returned to callers of the upload boundary
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub error: &'static str,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamDetails>,
}

/// Upstream response details attached to an `UpstreamError` payload
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamDetails {
    pub status: u16,
    pub method: String,
    pub url: String,
    pub body: String,
}

/// Truncate a response body to `BODY_PREVIEW_LIMIT` characters
pub fn body_preview(body: &str) -> String {
    match body.char_indices().nth(BODY_PREVIEW_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

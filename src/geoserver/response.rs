//! Classification of GeoServer REST responses
//!
//! Create calls answer a duplicate either with 409 or, on some GeoServer
//! versions, with a generic 500 whose body says "already exists". Both are
//! folded into [`CallOutcome::AlreadyExists`] here so callers never match on
//! response text themselves.

use crate::core::error::{PublishError, body_preview};
use reqwest::StatusCode;

/// Tagged result of a single admin API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Ok,
    AlreadyExists,
    Failed { status: u16, body: String },
}

impl CallOutcome {
    /// Classify a create (POST) response
    pub fn for_create(status: StatusCode, body: &str) -> Self {
        if status.is_success() {
            Self::Ok
        } else if status == StatusCode::CONFLICT {
            Self::AlreadyExists
        } else if status.is_server_error() && mentions_already_exists(body) {
            Self::AlreadyExists
        } else {
            Self::failed(status, body)
        }
    }

    /// Classify an update (PUT) response, where only 2xx counts
    pub fn for_update(status: StatusCode, body: &str) -> Self {
        if status.is_success() {
            Self::Ok
        } else {
            Self::failed(status, body)
        }
    }

    fn failed(status: StatusCode, body: &str) -> Self {
        Self::Failed {
            status: status.as_u16(),
            body: body_preview(body),
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Collapse into a `Result`, attaching request context to failures
    pub fn into_result(self, method: &str, url: &str, message: &str) -> Result<(), PublishError> {
        match self {
            Self::Ok | Self::AlreadyExists => Ok(()),
            Self::Failed { status, body } => Err(PublishError::Upstream {
                status_code: status,
                method: method.to_string(),
                url: url.to_string(),
                body_preview: body,
                message: message.to_string(),
            }),
        }
    }
}

fn mentions_already_exists(body: &str) -> bool {
    body.to_lowercase().contains("already exists")
}

//! GeoServer REST client
//!
//! Implements [`MapServerAdmin`] against the GeoServer administrative API.
//! Every method issues one request (plus existence probes where the
//! operation is idempotent) with basic credentials and a fixed timeout. No
//! retries are performed here.

use crate::core::config::GeoServerConfig;
use crate::core::error::PublishError;
use crate::core::traits::MapServerAdmin;
use crate::geoserver::response::CallOutcome;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};

/// Content type for XML resource descriptions
const XML_CONTENT_TYPE: &str = "text/xml";

/// Content type for SLD 1.1 / SE style bodies
const SLD_CONTENT_TYPE: &str = "application/vnd.ogc.se+xml";

/// HTTP client for the GeoServer REST API
///
/// Cheap to clone and safe to share between concurrent uploads; all state is
/// fixed at construction.
#[derive(Debug, Clone)]
pub struct GeoServerClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: SecretString,
}

impl GeoServerClient {
    /// Create a client from the GeoServer configuration section
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Configuration` when the HTTP client cannot be
    /// built or the base URL is empty.
    pub fn new(config: &GeoServerConfig) -> Result<Self, PublishError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(PublishError::configuration("geoserver.baseUrl is required"));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                PublishError::configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ------------------------------------------------------------------
    // URLs
    // ------------------------------------------------------------------

    fn workspace_url(&self, workspace: &str) -> String {
        format!("{}/workspaces/{}", self.base_url, workspace)
    }

    fn styles_url(&self, workspace: &str) -> String {
        format!("{}/styles", self.workspace_url(workspace))
    }

    fn style_url(&self, workspace: &str, name: &str) -> String {
        format!("{}/{}", self.styles_url(workspace), name)
    }

    fn feature_types_url(&self, workspace: &str, datastore: &str) -> String {
        format!(
            "{}/datastores/{}/featuretypes",
            self.workspace_url(workspace),
            datastore
        )
    }

    fn layer_url(&self, workspace: &str, layer: &str) -> String {
        format!("{}/layers/{}:{}", self.base_url, workspace, layer)
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.user, Some(self.password.expose_secret()))
    }

    /// Send a request and read the whole body
    async fn send(
        &self,
        method: Method,
        url: &str,
        content_type: Option<&str>,
        body: Option<String>,
    ) -> Result<(StatusCode, String), PublishError> {
        let mut request = self.request(method.clone(), url);
        if let Some(content_type) = content_type {
            request = request
                .header(CONTENT_TYPE, content_type)
                .header(ACCEPT, "application/xml");
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| network_error(&method, url, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| network_error(&method, url, e))?;

        tracing::debug!(method = %method, url, status = status.as_u16(), "geoserver request");

        Ok((status, text))
    }

    /// Existence probe: only 200 counts as present
    async fn exists(&self, url: &str) -> Result<bool, PublishError> {
        let (status, _) = self.send(Method::GET, url, None, None).await?;
        Ok(status == StatusCode::OK)
    }

    pub async fn workspace_exists(&self, workspace: &str) -> Result<bool, PublishError> {
        self.exists(&self.workspace_url(workspace)).await
    }

    pub async fn style_exists(&self, workspace: &str, name: &str) -> Result<bool, PublishError> {
        self.exists(&format!("{}.xml", self.style_url(workspace, name)))
            .await
    }

    pub async fn feature_type_exists(
        &self,
        workspace: &str,
        datastore: &str,
        layer: &str,
    ) -> Result<bool, PublishError> {
        let url = format!("{}/{}.xml", self.feature_types_url(workspace, datastore), layer);
        self.exists(&url).await
    }
}

#[async_trait]
impl MapServerAdmin for GeoServerClient {
    async fn ensure_style_registered(
        &self,
        name: &str,
        workspace: &str,
        filename: &str,
    ) -> Result<(), PublishError> {
        if !self.workspace_exists(workspace).await? {
            return Err(PublishError::NotFound {
                resource: format!("workspace '{}'", workspace),
                url: self.workspace_url(workspace),
            });
        }
        if self.style_exists(workspace, name).await? {
            tracing::debug!(workspace, style = name, "style already registered");
            return Ok(());
        }

        let url = self.styles_url(workspace);
        let payload = format!(
            "<style><name>{}</name><filename>{}</filename></style>",
            xml_escape(name),
            xml_escape(filename)
        );
        let (status, body) = self
            .send(Method::POST, &url, Some(XML_CONTENT_TYPE), Some(payload))
            .await?;

        let outcome = CallOutcome::for_create(status, &body);
        if outcome == CallOutcome::AlreadyExists {
            tracing::debug!(
                workspace,
                style = name,
                status = status.as_u16(),
                "style created concurrently"
            );
        }
        outcome.into_result("POST", &url, &format!("failed to register style '{}'", name))
    }

    async fn upload_style_body(
        &self,
        name: &str,
        workspace: &str,
        sld_body: &str,
    ) -> Result<(), PublishError> {
        let url = self.style_url(workspace, name);
        let (status, body) = self
            .send(
                Method::PUT,
                &url,
                Some(SLD_CONTENT_TYPE),
                Some(sld_body.to_string()),
            )
            .await?;

        CallOutcome::for_update(status, &body).into_result(
            "PUT",
            &url,
            &format!("failed to upload SLD body for style '{}'", name),
        )
    }

    async fn ensure_feature_type_published(
        &self,
        workspace: &str,
        datastore: &str,
        layer: &str,
    ) -> Result<(), PublishError> {
        if self.feature_type_exists(workspace, datastore, layer).await? {
            tracing::debug!(workspace, datastore, layer, "feature type already published");
            return Ok(());
        }

        let url = self.feature_types_url(workspace, datastore);
        let payload = format!("<featureType><name>{}</name></featureType>", xml_escape(layer));
        let (status, body) = self
            .send(Method::POST, &url, Some(XML_CONTENT_TYPE), Some(payload))
            .await?;

        CallOutcome::for_create(status, &body).into_result(
            "POST",
            &url,
            &format!("failed to publish feature type '{}'", layer),
        )
    }

    async fn bind_default_style(
        &self,
        layer: &str,
        workspace: &str,
        style_name: &str,
    ) -> Result<(), PublishError> {
        let url = self.layer_url(workspace, layer);
        let payload = format!(
            concat!(
                "<layer>\n",
                "  <defaultStyle>\n",
                "    <name>{}</name>\n",
                "    <workspace>{}</workspace>\n",
                "  </defaultStyle>\n",
                "</layer>"
            ),
            xml_escape(style_name),
            xml_escape(workspace)
        );
        let (status, body) = self
            .send(Method::PUT, &url, Some(XML_CONTENT_TYPE), Some(payload))
            .await?;

        CallOutcome::for_update(status, &body).into_result(
            "PUT",
            &url,
            &format!("failed to bind default style '{}'", style_name),
        )
    }

    async fn fetch_style_body_length(&self, workspace: &str, name: &str) -> Option<usize> {
        let url = format!("{}.sld", self.style_url(workspace, name));
        match self.send(Method::GET, &url, None, None).await {
            Ok((status, body)) if status.is_success() => Some(body.chars().count()),
            Ok((status, _)) => {
                tracing::warn!(url, status = status.as_u16(), "style body not retrievable");
                None
            }
            Err(error) => {
                tracing::warn!(url, error = %error, "style body fetch failed");
                None
            }
        }
    }

    async fn probe_layer_status(&self, layer: &str, workspace: &str) -> Option<u16> {
        let url = self.layer_url(workspace, layer);
        match self.send(Method::GET, &url, None, None).await {
            Ok((status, _)) => Some(status.as_u16()),
            Err(error) => {
                tracing::warn!(url, error = %error, "layer status probe failed");
                None
            }
        }
    }
}

fn network_error(method: &Method, url: &str, error: reqwest::Error) -> PublishError {
    let message = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };

    PublishError::Network {
        method: method.to_string(),
        url: url.to_string(),
        message,
    }
}

/// Escape text for inclusion in an XML element
fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

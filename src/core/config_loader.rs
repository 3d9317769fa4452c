//! Configuration file loader for shapefile-publisher
//!
//! This module provides configuration loading, environment overrides,
//! `${VAR}` expansion and validation.

use super::config::*;
use crate::core::error::PublishError;
use crate::core::naming::parse_toggle;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;

/// Directory holding the environment-specific configuration files
const CONFIG_DIR: &str = "config";

/// Environment variable selecting `config/publisher.<env>.yaml`
const ENVIRONMENT_VAR: &str = "PUBLISHER_ENV";

/// Environment variable pattern (${VAR_NAME})
static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Explicit configuration file (skips environment-based resolution)
    pub config_path: Option<PathBuf>,

    /// Directory the default `config/` folder is resolved against
    pub base_dir: PathBuf,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options built from the current process environment
    pub fn from_process(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            base_dir: PathBuf::from("."),
            env: std::env::vars().collect(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "geoserver.baseUrl")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. Environment variables (`PUBLISHER_*`)
    /// 2. Configuration file (`--config` or `config/publisher.<env>.yaml`)
    /// 3. Default values
    ///
    /// CLI flags are applied by the caller on top of the returned value.
    pub async fn load(options: ConfigLoadOptions) -> Result<AppConfig, PublishError> {
        let path = match &options.config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(PublishError::configuration(format!(
                        "configuration file {} does not exist",
                        path.display()
                    )));
                }
                path.clone()
            }
            None => Self::resolve_config_file(&options.base_dir, &options.env),
        };

        let mut config = match Self::load_config_file(&path).await? {
            Some(config) => {
                tracing::debug!(path = %path.display(), "loaded configuration file");
                config
            }
            None => {
                tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                AppConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config, &options.env)?;
        Self::expand_env_vars(&mut config, &options.env);
        Self::normalize(&mut config);

        Ok(config)
    }

    /// Path of the environment-specific configuration file
    pub fn resolve_config_file(base_dir: &Path, env: &HashMap<String, String>) -> PathBuf {
        let environment = env
            .get(ENVIRONMENT_VAR)
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "dev".to_string());

        base_dir
            .join(CONFIG_DIR)
            .join(format!("publisher.{}.yaml", environment))
    }

    /// Load configuration from a YAML, TOML or JSON file
    async fn load_config_file(file_path: &Path) -> Result<Option<AppConfig>, PublishError> {
        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            PublishError::configuration(format!("failed to read config file: {}", e))
        })?;

        Self::parse(&content, file_path).map(Some)
    }

    fn parse(content: &str, file_path: &Path) -> Result<AppConfig, PublishError> {
        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => toml::from_str(content).map_err(|e| {
                PublishError::configuration(format!("failed to parse TOML config: {}", e))
            }),
            Some("json") => serde_json::from_str(content).map_err(|e| {
                PublishError::configuration(format!("failed to parse JSON config: {}", e))
            }),
            _ => serde_yaml::from_str(content).map_err(|e| {
                PublishError::configuration(format!("failed to parse YAML config: {}", e))
            }),
        }
    }

    /// Apply `PUBLISHER_*` environment variables
    fn apply_env_overrides(
        config: &mut AppConfig,
        env: &HashMap<String, String>,
    ) -> Result<(), PublishError> {
        let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

        if let Some(host) = get("PUBLISHER_DB_HOST") {
            config.database.host = host;
        }
        if let Some(port) = get("PUBLISHER_DB_PORT") {
            config.database.port = port.parse().map_err(|_| {
                PublishError::configuration(format!("PUBLISHER_DB_PORT is not a port: {}", port))
            })?;
        }
        if let Some(user) = get("PUBLISHER_DB_USER") {
            config.database.user = user;
        }
        if let Some(password) = get("PUBLISHER_DB_PASSWORD") {
            config.database.password = SecretString::from(password);
        }
        if let Some(name) = get("PUBLISHER_DB_NAME") {
            config.database.name = name;
        }

        if let Some(url) = get("PUBLISHER_GEOSERVER_URL") {
            config.geoserver.base_url = url;
        }
        if let Some(user) = get("PUBLISHER_GEOSERVER_USER") {
            config.geoserver.user = user;
        }
        if let Some(password) = get("PUBLISHER_GEOSERVER_PASSWORD") {
            config.geoserver.password = SecretString::from(password);
        }
        if let Some(workspace) = get("PUBLISHER_GEOSERVER_WORKSPACE") {
            config.geoserver.workspace = workspace;
        }
        if let Some(datastore) = get("PUBLISHER_GEOSERVER_DATASTORE") {
            config.geoserver.datastore = datastore;
        }

        if let Some(enabled) = get("PUBLISHER_INDE_ENABLED") {
            config.inde.enabled = parse_toggle(&enabled);
        }
        if let Some(workspace) = get("PUBLISHER_INDE_WORKSPACE") {
            config.inde.workspace = Some(workspace);
        }
        if let Some(datastore) = get("PUBLISHER_INDE_DATASTORE") {
            config.inde.datastore = Some(datastore);
        }

        if let Some(temp_path) = get("PUBLISHER_UPLOAD_TEMP_PATH") {
            config.upload.temp_path = Some(PathBuf::from(temp_path));
        }

        Ok(())
    }

    /// Expand `${VAR}` placeholders in URLs and credentials
    fn expand_env_vars(config: &mut AppConfig, env: &HashMap<String, String>) {
        config.geoserver.base_url = Self::expand_string(&config.geoserver.base_url, env);
        config.geoserver.user = Self::expand_string(&config.geoserver.user, env);
        config.geoserver.password = SecretString::from(Self::expand_string(
            config.geoserver.password.expose_secret(),
            env,
        ));

        config.database.host = Self::expand_string(&config.database.host, env);
        config.database.user = Self::expand_string(&config.database.user, env);
        config.database.password = SecretString::from(Self::expand_string(
            config.database.password.expose_secret(),
            env,
        ));
    }

    /// Expand environment variables in a single string
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        let mut result = input.to_string();
        for cap in ENV_VAR_PATTERN.captures_iter(input) {
            let var_name = &cap[1];

            match env.get(var_name) {
                Some(value) => {
                    result = result.replace(&format!("${{{}}}", var_name), value);
                }
                None => {
                    tracing::warn!(variable = var_name, "environment variable not found");
                }
            }
        }

        result
    }

    fn normalize(config: &mut AppConfig) {
        let trimmed = config.geoserver.base_url.trim().trim_end_matches('/');
        config.geoserver.base_url = trimmed.to_string();
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. GeoServer
        let base_url = &config.geoserver.base_url;
        if base_url.is_empty() {
            errors.push(ConfigValidationError {
                field: "geoserver.baseUrl".to_string(),
                message: "baseUrl is required".to_string(),
            });
        } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ConfigValidationError {
                field: "geoserver.baseUrl".to_string(),
                message: format!("baseUrl must be an http(s) URL: {}", base_url),
            });
        }

        for (field, value) in [
            ("geoserver.workspace", &config.geoserver.workspace),
            ("geoserver.datastore", &config.geoserver.datastore),
            ("database.name", &config.database.name),
        ] {
            if value.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: format!("{} is required", field),
                });
            }
        }

        if config.geoserver.timeout_secs == 0 {
            errors.push(ConfigValidationError {
                field: "geoserver.timeoutSecs".to_string(),
                message: "timeout must be greater than zero".to_string(),
            });
        }
        if config.import.timeout_secs == 0 {
            errors.push(ConfigValidationError {
                field: "import.timeoutSecs".to_string(),
                message: "timeout must be greater than zero".to_string(),
            });
        }

        // 2. Credentials
        if config.geoserver.user.is_empty() || config.geoserver.password.expose_secret().is_empty()
        {
            warnings.push(ConfigValidationWarning {
                field: "geoserver.password".to_string(),
                message: "GeoServer credentials are empty".to_string(),
                suggestion: Some("Set PUBLISHER_GEOSERVER_PASSWORD".to_string()),
            });
        }

        // 3. INDE mirror
        let blank = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().is_empty();
        if config.inde.enabled && (blank(&config.inde.workspace) || blank(&config.inde.datastore)) {
            warnings.push(ConfigValidationWarning {
                field: "inde".to_string(),
                message: "INDE is enabled but workspace/datastore are incomplete".to_string(),
                suggestion: Some(
                    "Mirror publication requests will fail until both are set".to_string(),
                ),
            });
        }

        // 4. Retry
        if config.retry.max_attempts == 0 {
            errors.push(ConfigValidationError {
                field: "retry.maxAttempts".to_string(),
                message: "maxAttempts must be at least 1".to_string(),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("Configuration validation succeeded".to_string());
        } else {
            lines.push("Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\nErrors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\nWarnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

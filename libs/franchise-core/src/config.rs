//! Client configuration
//!
//! [`ClientConfig`] is the resolved configuration. Files and environment
//! variables are read into a [`ConfigOverlay`], where every field is
//! optional, and applied on top of the defaults so that a source only
//! overrides what it actually sets.

use crate::error::{FranchiseError, Result};
use crate::models::CaseStatus;
use franchise_common::constants::{
    DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS, ENV_API_URL, ENV_DEFAULT_STATUS,
    ENV_JSON_LOGS, ENV_LOG_LEVEL, ENV_REQUEST_TIMEOUT, ENV_SESSION_PATH, SESSION_FILENAME,
};
use franchise_common::utils::{parse_flag, user_config_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL of the REST API
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of text
    pub json_logs: bool,
    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
}

/// Resolved client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub api: ApiConfig,
    /// Where the session file lives
    pub session_path: PathBuf,
    /// Status a case reports before any service has started
    pub default_case_status: CaseStatus,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: DEFAULT_API_URL.to_string(),
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            session_path: user_config_dir().join(SESSION_FILENAME),
            default_case_status: CaseStatus::NewCase,
            logging: LoggingConfig {
                level: "info".to_string(),
                json_logs: false,
                log_file: None,
            },
        }
    }
}

/// Partial configuration from a single source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigOverlay {
    pub api_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub session_path: Option<PathBuf>,
    pub default_case_status: Option<CaseStatus>,
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl ConfigOverlay {
    /// Read overrides from `FRANCHISE_*` environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set to an unparseable value
    pub fn from_env() -> Result<Self> {
        let mut overlay = Self::default();

        if let Ok(url) = std::env::var(ENV_API_URL) {
            overlay.api_url = Some(url);
        }
        if let Ok(timeout) = std::env::var(ENV_REQUEST_TIMEOUT) {
            overlay.request_timeout_secs = Some(timeout.parse().map_err(|_| {
                FranchiseError::configuration(format!("Invalid {ENV_REQUEST_TIMEOUT} value"))
            })?);
        }
        if let Ok(path) = std::env::var(ENV_SESSION_PATH) {
            overlay.session_path = Some(PathBuf::from(path));
        }
        if let Ok(status) = std::env::var(ENV_DEFAULT_STATUS) {
            overlay.default_case_status = Some(status.parse().map_err(|_| {
                FranchiseError::configuration(format!("Invalid {ENV_DEFAULT_STATUS} value"))
            })?);
        }
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            overlay.log_level = Some(level.to_lowercase());
        }
        if let Ok(json_logs) = std::env::var(ENV_JSON_LOGS) {
            overlay.json_logs = Some(parse_flag(&json_logs).ok_or_else(|| {
                FranchiseError::configuration(format!("Invalid {ENV_JSON_LOGS} value"))
            })?);
        }

        Ok(overlay)
    }

    /// Load overrides from a JSON or YAML file, chosen by extension
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FranchiseError::Io(std::io::Error::other(format!(
                "Failed to read config file {}: {e}",
                path.display()
            )))
        })?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yaml::from_str(&content)?),
            _ => serde_json::from_str(&content).map_err(|e| {
                FranchiseError::configuration(format!("Failed to parse JSON config: {e}"))
            }),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl ClientConfig {
    /// Apply the fields an overlay sets
    pub fn apply(&mut self, overlay: &ConfigOverlay) {
        if let Some(url) = &overlay.api_url {
            self.api.base_url.clone_from(url);
        }
        if let Some(timeout) = overlay.request_timeout_secs {
            self.api.request_timeout_secs = timeout;
        }
        if let Some(path) = &overlay.session_path {
            self.session_path.clone_from(path);
        }
        if let Some(status) = overlay.default_case_status {
            self.default_case_status = status;
        }
        if let Some(level) = &overlay.log_level {
            self.logging.level.clone_from(level);
        }
        if let Some(json_logs) = overlay.json_logs {
            self.logging.json_logs = json_logs;
        }
        if let Some(log_file) = &overlay.log_file {
            self.logging.log_file = Some(log_file.clone());
        }
    }

    /// Parsed API base URL
    ///
    /// # Errors
    /// Returns an error if the URL is not an absolute http(s) URL
    pub fn api_url(&self) -> Result<Url> {
        let url = Url::parse(&self.api.base_url).map_err(|e| {
            FranchiseError::configuration(format!("Invalid API URL '{}': {e}", self.api.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(FranchiseError::configuration(format!(
                "API URL must be an http(s) URL: {}",
                self.api.base_url
            )));
        }
        Ok(url)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid
    pub fn validate(&self) -> Result<()> {
        self.api_url()?;

        if self.api.request_timeout_secs == 0 {
            return Err(FranchiseError::configuration(
                "Request timeout must be greater than 0",
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(FranchiseError::configuration(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if matches!(
            self.default_case_status,
            CaseStatus::InProgress | CaseStatus::Completed
        ) || self.default_case_status.is_legacy_outcome()
        {
            return Err(FranchiseError::configuration(format!(
                "Default case status must be an initial status, got {}",
                self.default_case_status
            )));
        }

        Ok(())
    }

    /// Save the configuration as JSON or YAML
    ///
    /// # Errors
    /// Returns an error if the format is unsupported or the file cannot be written
    pub fn to_file<P: AsRef<Path>>(&self, path: P, format: &str) -> Result<()> {
        let content = match format {
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            "json" => serde_json::to_string_pretty(self)?,
            _ => {
                return Err(FranchiseError::configuration(format!(
                    "Unsupported format: {format}"
                )))
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

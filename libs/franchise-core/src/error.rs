//! Error types for the franchise core library

use thiserror::Error;

/// Result type alias for franchise operations
pub type Result<T> = std::result::Result<T, FranchiseError>;

/// Main error type for franchise operations
#[derive(Error, Debug)]
pub enum FranchiseError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Case not found: {id}")]
    CaseNotFound { id: String },

    #[error("Service not found: {id}")]
    ServiceNotFound { id: String },

    #[error("Remark not found: {id}")]
    RemarkNotFound { id: String },

    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Not signed in: {message}")]
    Unauthenticated { message: String },

    #[error("Permission denied: {permission}")]
    PermissionDenied { permission: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl FranchiseError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unauthenticated error
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Create a permission error
    pub fn permission_denied(permission: impl Into<String>) -> Self {
        Self::PermissionDenied {
            permission: permission.into(),
        }
    }

    /// Create an unknown error
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Attach a follow-up failure to this error, keeping its kind where it
    /// carries a message
    #[must_use]
    pub fn with_note(self, note: impl std::fmt::Display) -> Self {
        match self {
            Self::Http(message) => Self::Http(format!("{message}; {note}")),
            Self::Api { status, message } => Self::Api {
                status,
                message: format!("{message}; {note}"),
            },
            other => Self::unknown(format!("{other}; {note}")),
        }
    }

    /// Whether the error came from the network or the backend rather than local state
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api { .. })
    }

    /// Short message suitable for a transient notice shown to the user
    #[must_use]
    pub fn user_notice(&self) -> String {
        match self {
            Self::Http(_) => "Could not reach the server, changes were reverted".to_string(),
            Self::Api { status, .. } if *status == 401 => {
                "Your session has expired, please sign in again".to_string()
            }
            Self::Api { status, .. } if *status == 403 => {
                "You are not allowed to make this change".to_string()
            }
            Self::Api { .. } => "The server rejected the change, it was reverted".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for FranchiseError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Api {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => Self::Http(err.to_string()),
        }
    }
}

impl From<serde_yaml::Error> for FranchiseError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::configuration(format!("Invalid YAML: {err}"))
    }
}

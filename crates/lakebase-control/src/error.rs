//! Error types for control-plane calls and provisioning workflows.

use std::fmt;
use std::time::Duration;

use crate::bootstrap::AdminError;

/// Substring the control plane uses when a create collides with an
/// existing resource that lives under a different identifier.
///
/// The control plane has no machine-readable reason code for this case, so
/// the classification is a heuristic over the message text. Keep every
/// message match in this module.
pub const CONFLICTING_RESOURCE_MARKER: &str = "already exists";

/// Errors returned by a control-plane call.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// The addressed resource does not exist.
    #[error("Resource not found: {message}")]
    NotFound {
        /// Message reported by the control plane.
        message: String,
    },

    /// A create collided with a resource of the same name.
    #[error("Resource already exists: {message}")]
    AlreadyExists {
        /// Message reported by the control plane.
        message: String,
    },

    /// The request was rejected. The raw message is kept for classification.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Message reported by the control plane.
        message: String,
    },

    /// Any other API-level failure.
    #[error("Control plane error (HTTP {status}, {error_code}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Vendor error code, empty if absent.
        error_code: String,
        /// Message reported by the control plane.
        message: String,
    },

    /// A long-running operation finished with an unclassified error.
    #[error("Operation {name} failed: {message}")]
    OperationFailed {
        /// Operation name.
        name: String,
        /// Failure message.
        message: String,
    },

    /// A long-running operation did not finish in time.
    #[error("Operation {name} did not complete within {timeout:?}")]
    OperationTimeout {
        /// Operation name.
        name: String,
        /// Time waited.
        timeout: Duration,
    },

    /// The HTTP request could not be sent or its body could not be read.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("Failed to decode control plane response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Client-side configuration is unusable.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl ControlPlaneError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// Creates a new `BadRequest` error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Maps a vendor error code and optional HTTP status to an error variant.
    ///
    /// Codes win over status so that failed long-running operations, which
    /// carry no HTTP status, classify the same way as synchronous failures.
    #[must_use]
    pub fn classify(status: Option<u16>, error_code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match error_code {
            "RESOURCE_DOES_NOT_EXIST" | "NOT_FOUND" => return Self::NotFound { message },
            "RESOURCE_ALREADY_EXISTS" | "ALREADY_EXISTS" => {
                return Self::AlreadyExists { message };
            }
            "INVALID_PARAMETER_VALUE" | "BAD_REQUEST" | "INVALID_STATE" => {
                return Self::BadRequest { message };
            }
            _ => {}
        }
        match status {
            Some(404) => Self::NotFound { message },
            Some(409) => Self::AlreadyExists { message },
            Some(400) => Self::BadRequest { message },
            Some(status) => Self::Api {
                status,
                error_code: error_code.to_string(),
                message,
            },
            None => Self::OperationFailed {
                name: String::new(),
                message: if error_code.is_empty() {
                    message
                } else {
                    format!("{error_code}: {message}")
                },
            },
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` if this is a bad request error.
    #[must_use]
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest { .. })
    }

    /// Returns `true` for a bad request saying a conflicting resource already
    /// exists under another name.
    #[must_use]
    pub fn is_conflicting_resource(&self) -> bool {
        match self {
            Self::BadRequest { message } => message.contains(CONFLICTING_RESOURCE_MARKER),
            _ => false,
        }
    }

    /// Returns the error category for logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::BadRequest { .. } => ErrorCategory::Rejected,
            Self::Api { .. } | Self::OperationFailed { .. } => ErrorCategory::Remote,
            Self::OperationTimeout { .. } | Self::Transport(_) => ErrorCategory::Infrastructure,
            Self::Decode(_) | Self::Config { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of control-plane errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Resource not found.
    NotFound,
    /// Resource already exists.
    Conflict,
    /// Request rejected.
    Rejected,
    /// Remote failure.
    Remote,
    /// Network or timeout.
    Infrastructure,
    /// Local failure.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Rejected => write!(f, "rejected"),
            Self::Remote => write!(f, "remote"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Errors that abort a provisioning workflow.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// An unrecoverable control-plane failure.
    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),

    /// Creating the application database failed.
    #[error("Database bootstrap failed: {0}")]
    Bootstrap(#[from] AdminError),

    /// An identifier derived from user input is not acceptable to the control plane.
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        /// What the identifier names (role id, database name, ...).
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The endpoint has no resolved host yet.
    #[error("Endpoint {endpoint} has no host yet")]
    EndpointNotReady {
        /// Endpoint resource name.
        endpoint: String,
    },
}

impl ProvisionError {
    /// Creates a new `InvalidIdentifier` error.
    #[must_use]
    pub fn invalid_identifier(
        kind: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidIdentifier {
            kind,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for control-plane calls.
pub type Result<T> = std::result::Result<T, ControlPlaneError>;

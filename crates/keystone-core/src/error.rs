//! Error types for Keystone.
//!
//! This module provides the [`KeystoneError`] type, the single error type that
//! flows through routing, callback resolution and the middleware chain.
//!
//! Components raise typed, specific errors. Only the outermost dispatch
//! boundary maps an error to an HTTP response, using
//! [`KeystoneError::status_code`] and [`KeystoneError::to_envelope`].
//!
//! | `ErrorCategory` | Status | Raised by |
//! |---|---|---|
//! | `NotFound` | 404 | route lookup, named-route lookup, container lookup |
//! | `Configuration` | 500 | malformed callbacks, invalid routes/methods, container misconfiguration |
//! | `Authentication` | 401 | credential checks |
//! | `Authorization` | 403 | role checks |
//! | `Internal` | 500 | anything else |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`KeystoneError`].
pub type KeystoneResult<T> = Result<T, KeystoneError>;

/// Categories of errors for classification and handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Route, named route, controller or service not found.
    NotFound,
    /// Bootstrap-time misconfiguration (routes, callbacks, container).
    Configuration,
    /// Invalid or missing credentials.
    Authentication,
    /// Authenticated but not permitted.
    Authorization,
    /// Internal server errors.
    Internal,
}

impl ErrorCategory {
    /// Returns the default HTTP status code for this error category.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::Configuration | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Standard error type for Keystone.
///
/// # Example
///
/// ```
/// use keystone_core::{ErrorCategory, KeystoneError};
///
/// let err = KeystoneError::route_not_found("GET", "/missing");
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
/// ```
#[derive(Error, Debug)]
pub enum KeystoneError {
    /// A route, named route, controller or container entry does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
        /// The kind of thing that was looked up ("route", "service", ...).
        resource_type: Option<String>,
        /// The identifier that was looked up.
        resource_id: Option<String>,
    },

    /// A callback reference could not be parsed.
    #[error("Malformed callback '{callback}': {reason}")]
    MalformedCallback {
        /// The offending callback string.
        callback: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A route definition is invalid (pattern, constraint or name).
    #[error("Invalid route '{route}': {reason}")]
    InvalidRoute {
        /// The route name or pattern.
        route: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An HTTP method token is not valid.
    #[error("Invalid HTTP method '{method}'")]
    InvalidMethod {
        /// The offending method token.
        method: String,
    },

    /// Authentication failed. The message never says which credential was wrong.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// Authorization denied.
    #[error("Authorization denied: {message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
    },

    /// The dependency container is misconfigured.
    #[error("Container error for '{service}': {reason}")]
    Container {
        /// The service id.
        service: String,
        /// Why resolution failed.
        reason: String,
    },

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl KeystoneError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource_type: None,
            resource_id: None,
        }
    }

    /// Creates a not found error with resource context.
    #[must_use]
    pub fn not_found_resource(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        let resource_type = resource_type.into();
        let resource_id = resource_id.into();
        Self::NotFound {
            message: format!("{resource_type} '{resource_id}' not found"),
            resource_type: Some(resource_type),
            resource_id: Some(resource_id),
        }
    }

    /// Creates the error raised when no route matches a request.
    #[must_use]
    pub fn route_not_found(method: impl AsRef<str>, path: impl AsRef<str>) -> Self {
        Self::NotFound {
            message: format!("no route matches {} {}", method.as_ref(), path.as_ref()),
            resource_type: Some("route".to_string()),
            resource_id: Some(path.as_ref().to_string()),
        }
    }

    /// Creates a malformed callback error.
    #[must_use]
    pub fn malformed_callback(callback: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCallback {
            callback: callback.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid route error.
    #[must_use]
    pub fn invalid_route(route: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRoute {
            route: route.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid method error.
    #[must_use]
    pub fn invalid_method(method: impl Into<String>) -> Self {
        Self::InvalidMethod {
            method: method.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an authorization error.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Creates a container misconfiguration error.
    #[must_use]
    pub fn container(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Container {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MalformedCallback { .. }
            | Self::InvalidRoute { .. }
            | Self::InvalidMethod { .. }
            | Self::Container { .. } => ErrorCategory::Configuration,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }

    /// Returns `true` for errors that indicate bootstrap misconfiguration.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.category(), ErrorCategory::Configuration)
    }

    /// Converts this error to a serializable error envelope.
    ///
    /// Configuration and internal errors are reported with a generic message so
    /// implementation details do not reach the client.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        let message = match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Internal => {
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
                category: self.category(),
                details: self.error_details(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::MalformedCallback { .. } => "MALFORMED_CALLBACK",
            Self::InvalidRoute { .. } => "INVALID_ROUTE",
            Self::InvalidMethod { .. } => "INVALID_METHOD",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Authorization { .. } => "AUTHORIZATION_DENIED",
            Self::Container { .. } => "CONTAINER_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::NotFound {
                resource_type: Some(rt),
                resource_id: Some(rid),
                ..
            } => Some(serde_json::json!({
                "resource_type": rt,
                "resource_id": rid
            })),
            _ => None,
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Error category.
    pub category: ErrorCategory,
    /// Additional error details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

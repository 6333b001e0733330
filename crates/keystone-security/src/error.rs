//! Error types for the security crate.

use keystone_core::KeystoneError;
use thiserror::Error;

/// Result type for security operations.
pub type SecurityResult<T> = Result<T, SecurityError>;

/// Errors raised by authentication, sessions and context configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SecurityError {
    /// No user with the submitted username.
    #[error("invalid username")]
    InvalidUsername,

    /// The submitted password did not verify.
    #[error("invalid password")]
    InvalidPassword,

    /// The submitted password is longer than encoders accept.
    #[error("password exceeds {max} bytes")]
    PasswordTooLong {
        /// Maximum accepted length in bytes.
        max: usize,
    },

    /// An access rule pattern failed to compile.
    #[error("invalid access rule pattern '{pattern}': {reason}")]
    InvalidRule {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// No context registered under the name.
    #[error("unknown security context '{0}'")]
    UnknownContext(String),

    /// The session store failed.
    #[error("session store error: {0}")]
    Session(String),

    /// A session value could not be (de)serialized.
    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SecurityError {
    /// Create an invalid rule error.
    pub fn invalid_rule(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Create a session store error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Returns `true` for credential failures that must be answered with a
    /// challenge rather than an error response.
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidUsername | Self::InvalidPassword | Self::PasswordTooLong { .. }
        )
    }
}

impl From<SecurityError> for KeystoneError {
    fn from(err: SecurityError) -> Self {
        if err.is_authentication_failure() {
            // Never say which part of the credentials was wrong.
            return Self::authentication("invalid credentials");
        }
        let message = err.to_string();
        Self::internal_with_source(message, err)
    }
}

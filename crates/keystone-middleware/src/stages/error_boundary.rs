//! Error boundary middleware.
//!
//! The single place where a [`KeystoneError`] becomes an HTTP response. Every
//! component below it raises typed errors; this stage maps each to its
//! status code and renders the JSON error envelope:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "NOT_FOUND",
//!     "message": "Not found: no route matches GET /missing",
//!     "category": "not_found"
//!   },
//!   "request_id": "0192b1f0-..."
//! }
//! ```
//!
//! Configuration and internal errors are logged in full and reported to the
//! client with a generic message.

use crate::middleware::{Middleware, Next};
use crate::stages::request_id::RequestId;
use keystone_core::{
    BoxFuture, ErrorCategory, KeystoneError, KeystoneResult, Request, Response, ResponseExt,
};

/// Converts errors from the rest of the chain into error responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorBoundaryMiddleware;

impl ErrorBoundaryMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Renders `error` as a JSON envelope response.
#[must_use]
pub fn error_response(error: &KeystoneError, request_id: Option<RequestId>) -> Response {
    let request_id = request_id.map(|id| id.to_string());

    match error.category() {
        ErrorCategory::Configuration | ErrorCategory::Internal => tracing::error!(
            error = %error,
            error.code = error.error_code(),
            request_id = request_id.as_deref(),
            "Request failed"
        ),
        _ => tracing::debug!(
            error = %error,
            error.code = error.error_code(),
            request_id = request_id.as_deref(),
            "Request rejected"
        ),
    }

    let envelope = error.to_envelope(request_id.as_deref());
    match serde_json::to_value(&envelope) {
        Ok(body) => Response::json(error.status_code(), &body),
        Err(_) => Response::empty(error.status_code()),
    }
}

impl Middleware for ErrorBoundaryMiddleware {
    fn name(&self) -> &'static str {
        "error_boundary"
    }

    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, KeystoneResult<Response>> {
        Box::pin(async move {
            let request_id = RequestId::of(&request);
            match next.run(request).await {
                Ok(response) => Ok(response),
                Err(error) => Ok(error_response(&error, request_id)),
            }
        })
    }
}

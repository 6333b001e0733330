//! Request logging middleware.
//!
//! Opens a `request` span per request carrying the method, path and request
//! id, and logs completion with status and duration:
//!
//! ```text
//! INFO request{http.method=GET http.path=/blog/7 request_id=0192...}: Request completed http.status_code=200 duration_ms=3
//! ```

use crate::middleware::{Middleware, Next};
use crate::stages::request_id::RequestId;
use keystone_core::{BoxFuture, KeystoneResult, Request, Response};
use std::time::Instant;
use tracing::Instrument;

/// Middleware that logs every request with `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLoggingMiddleware;

impl RequestLoggingMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestLoggingMiddleware {
    fn name(&self) -> &'static str {
        "request_logging"
    }

    fn process<'a>(
        &'a self,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, KeystoneResult<Response>> {
        let request_id = RequestId::of(&request).map(|id| id.to_string());
        let span = tracing::info_span!(
            "request",
            http.method = %request.method(),
            http.path = request.uri().path(),
            request_id = request_id.as_deref(),
        );

        Box::pin(
            async move {
                let start = Instant::now();
                tracing::debug!("Request started");

                let result = next.run(request).await;
                let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) => tracing::info!(
                        http.status_code = response.status().as_u16(),
                        duration_ms,
                        "Request completed"
                    ),
                    Err(error) => tracing::warn!(
                        error = %error,
                        http.status_code = error.status_code().as_u16(),
                        duration_ms,
                        "Request failed"
                    ),
                }
                result
            }
            .instrument(span),
        )
    }
}

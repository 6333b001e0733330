//! Built-in middleware stages.
//!
//! The application assembles them outermost first:
//!
//! 1. [`request_id`] - assign a request ID (UUID v7)
//! 2. [`error_boundary`] - turn errors into JSON error responses
//! 3. [`logging`] - log each request with its outcome and duration
//!
//! User middleware and security shields run inside these, before dispatch.

pub mod error_boundary;
pub mod logging;
pub mod request_id;

pub use error_boundary::{error_response, ErrorBoundaryMiddleware};
pub use logging::RequestLoggingMiddleware;
pub use request_id::{RequestId, RequestIdMiddleware, REQUEST_ID_HEADER};

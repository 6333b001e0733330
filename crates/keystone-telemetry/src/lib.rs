//! Structured logging for Keystone.
//!
//! Every Keystone crate logs through `tracing` macros with structured fields
//! (`http.method`, `http.path`, `route`, `context`, `state`, `request_id`).
//! This crate installs the subscriber that turns those events into output:
//!
//! - **JSON** lines for production log pipelines
//! - **Pretty** multi-line output for development
//!
//! Both honour an `EnvFilter` directive such as `info,keystone_router=debug`.
//!
//! # Example
//!
//! ```rust,no_run
//! use keystone_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development()).expect("logging");
//! tracing::info!(http.path = "/blog", "Serving");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

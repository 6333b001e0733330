//! Typed configuration for Keystone applications.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides, optionally seeded from a dotenv file
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`KeystoneConfig`] holds every section:
//!
//! - [`RoutingConfig`] - duplicate route policy and absolute URL base
//! - [`SessionSection`] - session cookie attributes
//! - [`SecuritySection`] - security contexts, shields, password encoder, users
//! - [`TelemetrySection`] - service name and logging
//!
//! # Example
//!
//! ```no_run
//! use keystone_config::ConfigLoader;
//!
//! # fn main() -> Result<(), keystone_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("keystone.toml")?
//!     .with_env_prefix("KEYSTONE")
//!     .load()?;
//!
//! println!("Session cookie: {}", config.session.cookie_name);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [routing]
//! duplicate_routes = "overwrite"
//! base_url = "https://example.com"
//!
//! [session]
//! cookie_name = "KEYSTONE_SESSION"
//! secure = true
//!
//! [[security.contexts]]
//! name = "main"
//! default = true
//! idle_timeout_secs = 1800
//!
//! [[security.contexts.rules]]
//! pattern = "^/admin"
//! roles = ["admin"]
//!
//! [[security.shields]]
//! context = "main"
//! scheme = "form"
//! logout_path = "/logout"
//!
//! [security.encoder]
//! algorithm = "sha512"
//! iterations = 5000
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Scalar values can be overridden with `PREFIX__SECTION__KEY` variables:
//!
//! - `KEYSTONE__SESSION__COOKIE_NAME=SID`
//! - `KEYSTONE__SECURITY__ENCODER__ITERATIONS=10000`
//! - `KEYSTONE__TELEMETRY__LOGGING__FORMAT=pretty`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use keystone_telemetry::{LogConfig, LogFormat};
pub use loader::ConfigLoader;
pub use schema::*;

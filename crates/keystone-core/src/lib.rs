//! # Keystone Core
//!
//! Core types and traits for the Keystone micro-framework.
//!
//! This crate provides the foundational types used throughout Keystone:
//!
//! - [`Request`] / [`Response`] - `http` messages with a buffered body
//! - [`KeystoneError`] - the single error type, with its HTTP mapping
//! - [`Params`] - values captured from route placeholders
//! - [`Container`] - string-keyed dependency container
//! - [`Callback`] / [`CallbackResolver`] - route handler declarations and
//!   their resolution into invocable units

#![doc(html_root_url = "https://docs.rs/keystone-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod callback;
mod container;
mod error;
mod params;
mod types;

pub use callback::{
    BoxFuture, Callback, CallbackResolver, ClosureHandler, ContainerAware, Controller,
    HandlerFuture, HandlerOutput, ResolvedCallback,
};
pub use container::{Container, Service, ServiceFactory};
pub use error::{ErrorCategory, ErrorDetail, ErrorEnvelope, KeystoneError, KeystoneResult};
pub use params::Params;
pub use types::{normalize_path, Request, Response, ResponseExt};

//! # Keystone
//!
//! **A micro-framework for routing, dispatch, middleware and security shields.**
//!
//! Keystone sits behind any HTTP listener: feed it an `http::Request`, get an
//! `http::Response` back.
//!
//! - **Routing** with `{name}` placeholders, regex constraints and reverse routing
//! - **Callbacks** as closures, controllers or `Class:action` references
//!   resolved through a service container
//! - **Middleware** in an ordered chain with short-circuiting
//! - **Security shields** guarding path patterns with HTTP Basic or a login form
//!
//! ## Quick Start
//!
//! ```rust
//! use keystone::prelude::*;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut builder = App::builder();
//! builder
//!     .routes_mut()
//!     .add_get(
//!         "/hello/{name}",
//!         Callback::closure(|_req, params: Params| async move {
//!             Ok(format!("Hello {}", params.get("name").unwrap_or("world")))
//!         }),
//!     )
//!     .unwrap();
//! let app = builder.build().unwrap();
//!
//! let request = http::Request::builder()
//!     .uri("/hello/ada")
//!     .body(http_body_util::Full::new(bytes::Bytes::new()))
//!     .unwrap();
//! let response = app.handle(request).await;
//! assert_eq!(response.status(), http::StatusCode::OK);
//! # });
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → RequestId → ErrorBoundary → Logging → Session → Shields → Middleware → Dispatch
//!                                                                                     ↓
//! Response ←─────────────────────────────────────────────────────────────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/keystone/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod wiring;

pub use app::{App, AppBuilder, URL_GENERATOR_SERVICE};

pub use keystone_config as config;
pub use keystone_core as core;
pub use keystone_middleware as middleware;
pub use keystone_router as router;
pub use keystone_security as security;
pub use keystone_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use keystone::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{App, AppBuilder};

    pub use keystone_config::{ConfigLoader, KeystoneConfig};
    pub use keystone_core::{
        BoxFuture, Callback, Container, ContainerAware, Controller, HandlerOutput, KeystoneError,
        KeystoneResult, Params, Request, Response, ResponseExt,
    };
    pub use keystone_middleware::{FnMiddleware, MatchedRoute, Middleware, Next};
    pub use keystone_router::{Route, RouteTable, UriGenerator};
    pub use keystone_security::{
        AuthenticatedUser, FormConfig, SecurityContext, Session, Shield, User,
    };
    pub use keystone_telemetry::init_logging;
}

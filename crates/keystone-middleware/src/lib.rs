//! # Keystone Middleware
//!
//! Middleware chain and request dispatch for the Keystone micro-framework.
//!
//! ```text
//! Request → RequestId → ErrorBoundary → Logging → [user middleware] → Dispatch
//!                                                                        ↓
//! Response ←──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`Middleware`] / [`Next`] - interceptors that delegate or short-circuit
//! - [`MiddlewareChain`] - declared middleware plus one terminal handler,
//!   linked fresh for every request
//! - [`DispatchHandler`] - terminal handler: route match, callback resolution,
//!   output normalization
//! - [`stages`] - built-in request id, error boundary and logging middleware
//!
//! ## Example
//!
//! ```
//! use keystone_core::{Callback, CallbackResolver, Container};
//! use keystone_middleware::{DispatchHandler, MiddlewareChain, stages::RequestLoggingMiddleware};
//! use keystone_router::{RouteMatcher, RouteTable};
//! use std::sync::Arc;
//!
//! let mut routes = RouteTable::new();
//! routes
//!     .add_get("/", Callback::closure(|_req, _params| async { Ok("home") }))
//!     .unwrap();
//!
//! let dispatch = DispatchHandler::new(
//!     RouteMatcher::new(Arc::new(routes)),
//!     Arc::new(CallbackResolver::new(Arc::new(Container::new()))),
//! );
//!
//! let mut chain = MiddlewareChain::new();
//! chain.add(RequestLoggingMiddleware::new()).set_terminal(dispatch);
//! assert_eq!(chain.middleware_names(), vec!["request_logging"]);
//! ```

#![doc(html_root_url = "https://docs.rs/keystone-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod dispatch;
pub mod middleware;
pub mod stages;

pub use chain::{BoxedMiddleware, MiddlewareChain};
pub use dispatch::{DispatchHandler, MatchedRoute};
pub use keystone_core::{BoxFuture, KeystoneError, KeystoneResult, Request, Response, ResponseExt};
pub use middleware::{handler_fn, FnHandler, FnMiddleware, Middleware, Next, RequestHandler};

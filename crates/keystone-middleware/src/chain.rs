//! Ordered middleware chain with a terminal handler.
//!
//! Middleware run in declaration order, outermost first:
//!
//! ```text
//! Request → A → B → Terminal
//!                      ↓
//! Response ← A ← B ←───┘
//! ```
//!
//! The declared list is never mutated while serving. Each call to
//! [`MiddlewareChain::handle`] builds a fresh [`Next`] list that borrows the
//! declared middleware, so one chain can serve concurrent requests.

use crate::middleware::{Middleware, Next, RequestHandler};
use keystone_core::{BoxFuture, KeystoneError, KeystoneResult, Request, Response};
use std::fmt;
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Middleware plus exactly one terminal handler.
///
/// # Example
///
/// ```rust
/// use http::StatusCode;
/// use keystone_middleware::{handler_fn, FnMiddleware, MiddlewareChain, Response, ResponseExt};
///
/// # tokio_test_block(async {
/// let mut chain = MiddlewareChain::new();
/// chain
///     .add(FnMiddleware::new("passthrough", |request, next| next.run(request)))
///     .set_terminal(handler_fn(|_request| async { Ok(Response::empty(StatusCode::OK)) }));
///
/// let request = http::Request::builder()
///     .uri("/")
///     .body(http_body_util::Full::new(bytes::Bytes::new()))
///     .unwrap();
/// let response = chain.handle(request).await.unwrap();
/// assert_eq!(response.status(), StatusCode::OK);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Default)]
pub struct MiddlewareChain {
    middleware: Vec<BoxedMiddleware>,
    terminal: Option<Arc<dyn RequestHandler>>,
}

impl MiddlewareChain {
    /// Creates an empty chain with no terminal handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware. It runs after every middleware added before it.
    pub fn add(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared middleware.
    pub fn add_shared(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Sets the terminal handler, replacing any previous one.
    pub fn set_terminal(&mut self, handler: impl RequestHandler) -> &mut Self {
        self.terminal = Some(Arc::new(handler));
        self
    }

    /// Sets an already shared terminal handler.
    pub fn set_shared_terminal(&mut self, handler: Arc<dyn RequestHandler>) -> &mut Self {
        self.terminal = Some(handler);
        self
    }

    /// Returns `true` once a terminal handler is set.
    #[must_use]
    pub fn has_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Returns middleware names in execution order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Returns `true` if no middleware are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Runs `request` through the chain.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::Internal`] if no terminal handler is set,
    /// otherwise whatever the chain returns.
    pub async fn handle(&self, request: Request) -> KeystoneResult<Response> {
        let terminal = self
            .terminal
            .as_deref()
            .ok_or_else(|| KeystoneError::internal("no terminal handler configured"))?;
        self.build_chain(terminal).run(request).await
    }

    /// Wraps the terminal in reverse declaration order so the first declared
    /// middleware ends up outermost.
    fn build_chain<'a>(&'a self, terminal: &'a dyn RequestHandler) -> Next<'a> {
        let mut next = Next::handler(terminal);
        for middleware in self.middleware.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }
}

impl RequestHandler for MiddlewareChain {
    fn handle(&self, request: Request) -> BoxFuture<'_, KeystoneResult<Response>> {
        Box::pin(MiddlewareChain::handle(self, request))
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("middleware", &self.middleware_names())
            .field("has_terminal", &self.has_terminal())
            .finish()
    }
}
